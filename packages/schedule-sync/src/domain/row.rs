//! Rows, patches and row-store events

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Ordered column → value mapping
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row with every listed column set to `Null`
    pub fn with_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            cells: columns
                .into_iter()
                .map(|name| (name.to_string(), Value::Null))
                .collect(),
        }
    }

    /// Builder-style setter
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Value of `column`; unknown columns read as `Null`
    pub fn get(&self, column: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .unwrap_or(NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.iter().any(|(name, _)| name == column)
    }

    /// Set a cell, appending the column if it is new
    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some((_, cell)) => *cell = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn cells(&self) -> &[(String, Value)] {
        &self.cells
    }

    pub fn apply(&mut self, patch: &RowPatch) {
        for (column, value) in patch.iter() {
            self.set(column, value.clone());
        }
    }
}

/// Partial row update
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowPatch {
    changes: Vec<(String, Value)>,
}

impl RowPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.changes.iter_mut().find(|(name, _)| name == column) {
            Some((_, cell)) => *cell = value,
            None => self.changes.push((column.to_string(), value)),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.changes
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.changes.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Who caused a row event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Authoritative load from the backing database; ids are trusted
    Load,
    /// Any editor of the flat table outside this crate
    External,
    /// Id write-back performed by the synchronizer
    Synchronizer,
    /// Writes issued by the persistence adapter
    Persistence,
}

impl Origin {
    /// Events this crate caused itself
    pub fn is_self_inflicted(&self) -> bool {
        matches!(self, Origin::Synchronizer | Origin::Persistence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEventKind {
    Inserted,
    Updated,
    Deleted,
    StructureChanged,
}

/// Event emitted by a row store after a mutation
#[derive(Debug, Clone, PartialEq)]
pub struct RowEvent {
    pub kind: RowEventKind,
    /// Position of the row at emission time
    pub index: usize,
    /// Row after the mutation (the removed row for deletions)
    pub row: Row,
    pub origin: Origin,
}

impl RowEvent {
    pub fn new(kind: RowEventKind, index: usize, row: Row, origin: Origin) -> Self {
        Self {
            kind,
            index,
            row,
            origin,
        }
    }

    pub fn structure_changed(origin: Origin) -> Self {
        Self::new(RowEventKind::StructureChanged, 0, Row::new(), origin)
    }
}
