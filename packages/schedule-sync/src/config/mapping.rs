//! Column bindings for the entry table and the relation table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::error::{ConfigError, ConfigResult};
use super::policy::{AggregationPolicy, DefaultEntryFactory, EntryFactory, RangePolicy, UpdatePolicy};
use crate::domain::{EntryId, RangeValue, RowStore, Value};

/// Immutable binding of semantic roles to entry-table columns
///
/// `id`, `start` and `end` are required; description, completion and root
/// roles are optional and skipped everywhere when unset.
#[derive(Clone)]
pub struct FieldMapping<T> {
    id: String,
    start: String,
    end: String,
    description: Option<String>,
    completion: Option<String>,
    root: Option<String>,
    root_identifier: Value,
    db_sync: bool,
    synthetic_root: Option<EntryId>,
    update_policy: UpdatePolicy,
    aggregation: AggregationPolicy,
    range_policy: Arc<dyn RangePolicy<T>>,
    entry_factory: Arc<dyn EntryFactory<T>>,
}

impl<T: RangeValue> FieldMapping<T> {
    pub fn builder() -> FieldMappingBuilder<T> {
        FieldMappingBuilder::default()
    }

    pub fn id_column(&self) -> &str {
        &self.id
    }

    pub fn start_column(&self) -> &str {
        &self.start
    }

    pub fn end_column(&self) -> &str {
        &self.end
    }

    pub fn description_column(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn completion_column(&self) -> Option<&str> {
        self.completion.as_deref()
    }

    pub fn root_column(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Parent-cell value that marks a top-level entry
    pub fn root_identifier(&self) -> &Value {
        &self.root_identifier
    }

    pub fn db_sync(&self) -> bool {
        self.db_sync
    }

    /// Id of the invisible node a view may wrap real roots in
    pub fn synthetic_root(&self) -> Option<&EntryId> {
        self.synthetic_root.as_ref()
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        self.update_policy
    }

    pub fn aggregation(&self) -> AggregationPolicy {
        self.aggregation
    }

    pub fn range_policy(&self) -> &dyn RangePolicy<T> {
        self.range_policy.as_ref()
    }

    pub fn entry_factory(&self) -> &dyn EntryFactory<T> {
        self.entry_factory.as_ref()
    }

    /// True when a parent cell denotes a top-level entry.
    ///
    /// Empty cells are top-level regardless of the configured sentinel.
    pub fn is_root_value(&self, value: &Value) -> bool {
        value.is_null() || value == &self.root_identifier
    }

    /// Cell value written for a parent link
    pub fn parent_value(&self, parent: Option<&EntryId>) -> Value {
        match parent {
            None => self.root_identifier.clone(),
            Some(id) if Some(id) == self.synthetic_root.as_ref() => self.root_identifier.clone(),
            Some(id) => id.to_value(),
        }
    }

    /// Roles bound to a column, in declaration order
    pub fn bound_columns(&self) -> Vec<(&'static str, &str)> {
        let mut columns = vec![
            ("id", self.id.as_str()),
            ("start", self.start.as_str()),
            ("end", self.end.as_str()),
        ];
        if let Some(c) = &self.description {
            columns.push(("description", c));
        }
        if let Some(c) = &self.completion {
            columns.push(("completion", c));
        }
        if let Some(c) = &self.root {
            columns.push(("root", c));
        }
        columns
    }

    /// Every bound column must be declared by `store`
    pub fn validate_against(&self, store: &dyn RowStore) -> ConfigResult<()> {
        check_declared(store, self.bound_columns())
    }
}

impl<T> fmt::Debug for FieldMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("id", &self.id)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("description", &self.description)
            .field("completion", &self.completion)
            .field("root", &self.root)
            .field("root_identifier", &self.root_identifier)
            .field("db_sync", &self.db_sync)
            .field("synthetic_root", &self.synthetic_root)
            .field("update_policy", &self.update_policy)
            .field("aggregation", &self.aggregation)
            .finish_non_exhaustive()
    }
}

/// Builder for `FieldMapping`
pub struct FieldMappingBuilder<T> {
    id: Option<String>,
    start: Option<String>,
    end: Option<String>,
    description: Option<String>,
    completion: Option<String>,
    root: Option<String>,
    root_identifier: Value,
    db_sync: bool,
    synthetic_root: Option<EntryId>,
    update_policy: UpdatePolicy,
    aggregation: AggregationPolicy,
    range_policy: Option<Arc<dyn RangePolicy<T>>>,
    entry_factory: Option<Arc<dyn EntryFactory<T>>>,
}

impl<T> Default for FieldMappingBuilder<T> {
    fn default() -> Self {
        Self {
            id: None,
            start: None,
            end: None,
            description: None,
            completion: None,
            root: None,
            root_identifier: Value::Null,
            db_sync: false,
            synthetic_root: None,
            update_policy: UpdatePolicy::default(),
            aggregation: AggregationPolicy::default(),
            range_policy: None,
            entry_factory: None,
        }
    }
}

impl<T: RangeValue> FieldMappingBuilder<T> {
    pub fn id(mut self, column: impl Into<String>) -> Self {
        self.id = Some(column.into());
        self
    }

    pub fn start(mut self, column: impl Into<String>) -> Self {
        self.start = Some(column.into());
        self
    }

    pub fn end(mut self, column: impl Into<String>) -> Self {
        self.end = Some(column.into());
        self
    }

    pub fn description(mut self, column: impl Into<String>) -> Self {
        self.description = Some(column.into());
        self
    }

    pub fn completion(mut self, column: impl Into<String>) -> Self {
        self.completion = Some(column.into());
        self
    }

    pub fn root(mut self, column: impl Into<String>) -> Self {
        self.root = Some(column.into());
        self
    }

    pub fn root_identifier(mut self, value: impl Into<Value>) -> Self {
        self.root_identifier = value.into();
        self
    }

    pub fn db_sync(mut self, enabled: bool) -> Self {
        self.db_sync = enabled;
        self
    }

    pub fn synthetic_root(mut self, id: impl Into<EntryId>) -> Self {
        self.synthetic_root = Some(id.into());
        self
    }

    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn aggregation(mut self, policy: AggregationPolicy) -> Self {
        self.aggregation = policy;
        self
    }

    pub fn range_policy(mut self, policy: impl RangePolicy<T> + 'static) -> Self {
        self.range_policy = Some(Arc::new(policy));
        self
    }

    pub fn entry_factory(mut self, factory: impl EntryFactory<T> + 'static) -> Self {
        self.entry_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> ConfigResult<FieldMapping<T>> {
        let id = required(self.id, "id")?;
        let start = required(self.start, "start")?;
        let end = required(self.end, "end")?;
        let range_policy = self.range_policy.ok_or(ConfigError::MissingRangePolicy)?;

        let mapping = FieldMapping {
            id,
            start,
            end,
            description: self.description,
            completion: self.completion,
            root: self.root,
            root_identifier: self.root_identifier,
            db_sync: self.db_sync,
            synthetic_root: self.synthetic_root,
            update_policy: self.update_policy,
            aggregation: self.aggregation,
            range_policy,
            entry_factory: self
                .entry_factory
                .unwrap_or_else(|| Arc::new(DefaultEntryFactory)),
        };
        check_distinct(&mapping.bound_columns())?;
        Ok(mapping)
    }
}

/// Column bindings for the relation table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationFieldMapping {
    pub id: String,
    /// Holds the successor id
    pub entry_id: String,
    /// Holds the predecessor id
    pub relation_root: String,
    pub relation_type: String,
    #[serde(default)]
    pub db_sync: bool,
}

impl RelationFieldMapping {
    pub fn new(
        id: impl Into<String>,
        entry_id: impl Into<String>,
        relation_root: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            entry_id: entry_id.into(),
            relation_root: relation_root.into(),
            relation_type: relation_type.into(),
            db_sync: false,
        }
    }

    pub fn with_db_sync(mut self, enabled: bool) -> Self {
        self.db_sync = enabled;
        self
    }

    pub fn bound_columns(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("id", self.id.as_str()),
            ("entry_id", self.entry_id.as_str()),
            ("relation_root", self.relation_root.as_str()),
            ("relation_type", self.relation_type.as_str()),
        ]
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_distinct(&self.bound_columns())
    }

    pub fn validate_against(&self, store: &dyn RowStore) -> ConfigResult<()> {
        check_declared(store, self.bound_columns())
    }
}

fn required(column: Option<String>, role: &'static str) -> ConfigResult<String> {
    match column {
        Some(c) if !c.trim().is_empty() => Ok(c),
        _ => Err(ConfigError::MissingColumn { role }),
    }
}

fn check_distinct(columns: &[(&'static str, &str)]) -> ConfigResult<()> {
    for (i, (first, column)) in columns.iter().enumerate() {
        if let Some((second, _)) = columns[i + 1..].iter().find(|(_, c)| c == column) {
            return Err(ConfigError::DuplicateColumn {
                column: column.to_string(),
                first: *first,
                second: *second,
            });
        }
    }
    Ok(())
}

fn check_declared(store: &dyn RowStore, columns: Vec<(&'static str, &str)>) -> ConfigResult<()> {
    for (role, column) in columns {
        if store.column(column).is_none() {
            return Err(ConfigError::UndeclaredColumn {
                column: column.to_string(),
                role,
                table: store.table().to_string(),
            });
        }
    }
    Ok(())
}
