//! In-memory row store
//!
//! Vec-backed table with a queued event stream and change tracking. When a
//! `BackingDatabase` is attached, rows written with `sync = true` are
//! flushed to it by `flush_changed`.

use std::fmt;
use tracing::{debug, info, warn};

use crate::domain::{
    BackingDatabase, ColumnInfo, Origin, Row, RowEvent, RowEventKind, RowPatch, RowStore, Value,
};
use crate::error::{Result, SyncError};

/// Change waiting to be written to the backing database
#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Upsert(Value),
    Delete(Value),
}

impl Pending {
    fn key(&self) -> &Value {
        match self {
            Pending::Upsert(k) | Pending::Delete(k) => k,
        }
    }
}

pub struct InMemoryRowStore {
    table: String,
    columns: Vec<ColumnInfo>,
    key_column: String,
    rows: Vec<Row>,
    events: Vec<RowEvent>,
    pending: Vec<Pending>,
    backing: Option<Box<dyn BackingDatabase>>,
    table_ready: bool,
}

impl fmt::Debug for InMemoryRowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRowStore")
            .field("table", &self.table)
            .field("key_column", &self.key_column)
            .field("rows", &self.rows.len())
            .field("events", &self.events.len())
            .field("pending", &self.pending.len())
            .field("backed", &self.backing.is_some())
            .finish()
    }
}

impl InMemoryRowStore {
    /// Empty table keyed by its first column
    pub fn new(table: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        let key_column = columns.first().map(|c| c.name.clone()).unwrap_or_default();
        Self {
            table: table.into(),
            columns,
            key_column,
            rows: Vec::new(),
            events: Vec::new(),
            pending: Vec::new(),
            backing: None,
            table_ready: false,
        }
    }

    /// Key used to address rows in the backing database
    pub fn with_key(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    pub fn with_backing(mut self, backing: impl BackingDatabase + 'static) -> Self {
        self.backing = Some(Box::new(backing));
        self.table_ready = false;
        self
    }

    /// Populate a store from `backing`; rows arrive as `Origin::Load` inserts
    pub fn load(
        table: impl Into<String>,
        columns: Vec<ColumnInfo>,
        key_column: impl Into<String>,
        backing: impl BackingDatabase + 'static,
    ) -> Result<Self> {
        let mut store = Self::new(table, columns)
            .with_key(key_column)
            .with_backing(backing);
        store.prepare_backing()?;

        let rows = match store.backing.as_mut() {
            Some(db) => db.load(&store.table, &store.key_column, &store.columns)?,
            None => Vec::new(),
        };
        info!("load: {} rows from table {}", rows.len(), store.table);
        for row in rows {
            store.insert_row(row, false, Origin::Load)?;
        }
        Ok(store)
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Number of changes waiting for `flush_changed`
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    /// Announce that the table was reshaped wholesale
    pub fn structure_changed(&mut self, origin: Origin) {
        self.events.push(RowEvent::structure_changed(origin));
    }

    /// Replace every row without per-row events
    pub fn replace_rows(&mut self, rows: Vec<Row>, origin: Origin) -> Result<()> {
        let mut normalized = Vec::with_capacity(rows.len());
        for row in rows {
            normalized.push(self.normalize(row)?);
        }
        self.rows = normalized;
        self.structure_changed(origin);
        Ok(())
    }

    fn normalize(&self, row: Row) -> Result<Row> {
        let mut normalized = self.new_row();
        for (column, value) in row.cells() {
            self.require_column(column)?;
            normalized.set(column, value.clone());
        }
        Ok(normalized)
    }

    fn fill_generated(&self, row: &mut Row) {
        for column in self.columns.iter().filter(|c| c.auto_generated) {
            if row.get(&column.name).is_null() {
                let next = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(&column.name).as_i64())
                    .max()
                    .unwrap_or(0)
                    + 1;
                row.set(&column.name, next);
            }
        }
    }

    fn mark(&mut self, change: Pending) {
        if change.key().is_null() {
            debug!("mark: row of {} without key, not tracked", self.table);
            return;
        }
        self.pending.retain(|p| p.key() != change.key());
        self.pending.push(change);
    }

    fn prepare_backing(&mut self) -> Result<()> {
        if self.table_ready {
            return Ok(());
        }
        if let Some(db) = self.backing.as_mut() {
            db.ensure_table(&self.table, &self.key_column, &self.columns)?;
            self.table_ready = true;
        }
        Ok(())
    }
}

impl RowStore for InMemoryRowStore {
    fn table(&self) -> &str {
        &self.table
    }

    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    fn insert_row(&mut self, row: Row, sync: bool, origin: Origin) -> Result<usize> {
        let mut row = self.normalize(row)?;
        self.fill_generated(&mut row);
        let index = self.rows.len();
        if sync {
            self.mark(Pending::Upsert(row.get(&self.key_column).clone()));
        }
        self.rows.push(row.clone());
        self.events
            .push(RowEvent::new(RowEventKind::Inserted, index, row, origin));
        Ok(index)
    }

    fn update_row(
        &mut self,
        index: usize,
        patch: &RowPatch,
        sync: bool,
        origin: Origin,
    ) -> Result<()> {
        for (column, _) in patch.iter() {
            self.require_column(column)?;
        }
        let key_column = self.key_column.clone();
        let row = self
            .rows
            .get_mut(index)
            .ok_or_else(|| SyncError::row_not_found(&self.table, index))?;
        let old_key = row.get(&key_column).clone();
        row.apply(patch);
        let row = row.clone();

        if sync {
            let new_key = row.get(&key_column).clone();
            if !old_key.is_null() && old_key != new_key {
                self.mark(Pending::Delete(old_key));
            }
            self.mark(Pending::Upsert(new_key));
        }
        self.events
            .push(RowEvent::new(RowEventKind::Updated, index, row, origin));
        Ok(())
    }

    fn delete_row(&mut self, index: usize, sync: bool, origin: Origin) -> Result<Row> {
        if index >= self.rows.len() {
            return Err(SyncError::row_not_found(&self.table, index));
        }
        let row = self.rows.remove(index);
        if sync {
            self.mark(Pending::Delete(row.get(&self.key_column).clone()));
        }
        self.events
            .push(RowEvent::new(RowEventKind::Deleted, index, row.clone(), origin));
        Ok(row)
    }

    fn flush_changed(&mut self) -> Result<usize> {
        if self.backing.is_none() {
            if !self.pending.is_empty() {
                debug!("flush: no backing database, dropping {} changes", self.pending.len());
                self.pending.clear();
            }
            return Ok(0);
        }
        self.prepare_backing()?;

        let pending = std::mem::take(&mut self.pending);
        let mut written = 0;
        for (i, change) in pending.iter().enumerate() {
            let result = match change {
                Pending::Upsert(key) => match self.position(&self.key_column, key) {
                    Some(index) => {
                        let row = &self.rows[index];
                        match self.backing.as_mut() {
                            Some(db) => db.upsert(&self.table, &self.key_column, row),
                            None => Ok(()),
                        }
                    }
                    None => {
                        debug!("flush: row {} of {} gone before flush", key, self.table);
                        Ok(())
                    }
                },
                Pending::Delete(key) => match self.backing.as_mut() {
                    Some(db) => db.delete(&self.table, &self.key_column, key),
                    None => Ok(()),
                },
            };
            if let Err(err) = result {
                warn!(
                    "flush: {} of {} changes written to {} before failure",
                    written,
                    pending.len(),
                    self.table
                );
                let mut remaining = pending[i..].to_vec();
                remaining.append(&mut self.pending);
                self.pending = remaining;
                return Err(err);
            }
            written += 1;
        }
        debug!("flush: {} changes written to {}", written, self.table);
        Ok(written)
    }

    fn drain_events(&mut self) -> Vec<RowEvent> {
        std::mem::take(&mut self.events)
    }
}
