//! Row → Entry projection

use std::sync::Arc;

use crate::config::FieldMapping;
use crate::domain::{Entry, EntryId, RangeValue, Row};

/// Pure projection of an entry-table row onto an `Entry`
///
/// Only roles bound in the mapping are read; the rest keep the entry
/// factory's defaults. The parent link is `None` when the root cell holds
/// the root identifier (or is empty).
#[derive(Debug, Clone)]
pub struct EntryMapper<T> {
    mapping: Arc<FieldMapping<T>>,
}

impl<T: RangeValue> EntryMapper<T> {
    pub fn new(mapping: Arc<FieldMapping<T>>) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &FieldMapping<T> {
        &self.mapping
    }

    /// Id cell of `row`, if set
    pub fn row_id(&self, row: &Row) -> Option<EntryId> {
        EntryId::from_value(row.get(self.mapping.id_column()))
    }

    /// Parent id declared by `row` (`None` for top-level rows)
    pub fn row_parent(&self, row: &Row) -> Option<EntryId> {
        let column = self.mapping.root_column()?;
        let value = row.get(column);
        if self.mapping.is_root_value(value) {
            None
        } else {
            EntryId::from_value(value)
        }
    }

    /// Project `row`; `None` when the id cell is empty
    pub fn map(&self, row: &Row) -> Option<Entry<T>> {
        let id = self.row_id(row)?;
        let m = &self.mapping;

        let range = m
            .range_policy()
            .build(row.get(m.start_column()), row.get(m.end_column()));
        let mut entry = m.entry_factory().create(id, range);

        if let Some(column) = m.completion_column() {
            entry.completion = row.get(column).as_f64().unwrap_or(0.0);
        }
        if let Some(column) = m.description_column() {
            let cell = row.get(column);
            if !cell.is_null() {
                entry.name = cell.to_string();
            }
        }
        entry.parent = self.row_parent(row);
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NumericRangePolicy, TimestampRangePolicy};
    use crate::domain::{Range, Value, DEFAULT_ENTRY_NAME};
    use chrono::NaiveDateTime;

    fn full_mapping() -> Arc<FieldMapping<f64>> {
        Arc::new(
            FieldMapping::builder()
                .id("id")
                .start("start")
                .end("end")
                .description("name")
                .completion("completion")
                .root("parent")
                .root_identifier(0)
                .range_policy(NumericRangePolicy)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_map_full_row() {
        let mapper = EntryMapper::new(full_mapping());
        let row = Row::new()
            .with("id", 7)
            .with("start", 1.0)
            .with("end", 4.0)
            .with("name", "Design")
            .with("completion", 40.0)
            .with("parent", 3);

        let entry = mapper.map(&row).unwrap();

        assert_eq!(entry.id, EntryId::Int(7));
        assert_eq!(entry.name, "Design");
        assert_eq!(entry.range, Range::new(1.0, 4.0));
        assert_eq!(entry.completion, 40.0);
        assert_eq!(entry.parent, Some(EntryId::Int(3)));
        assert!(entry.children.is_empty());
    }

    #[test]
    fn test_map_defaults_for_unset_cells() {
        let mapper = EntryMapper::new(full_mapping());
        let row = Row::new().with("id", 1).with("start", 0.0).with("end", 1.0);

        let entry = mapper.map(&row).unwrap();

        assert_eq!(entry.name, DEFAULT_ENTRY_NAME);
        assert_eq!(entry.completion, 0.0);
        assert!(entry.is_root());
    }

    #[test]
    fn test_root_identifier_maps_to_top_level() {
        let mapper = EntryMapper::new(full_mapping());
        let row = Row::new().with("id", 1).with("parent", 0);

        assert_eq!(mapper.map(&row).unwrap().parent, None);
    }

    #[test]
    fn test_unconfigured_roles_are_skipped() {
        let mapping = Arc::new(
            FieldMapping::builder()
                .id("id")
                .start("start")
                .end("end")
                .range_policy(NumericRangePolicy)
                .build()
                .unwrap(),
        );
        let mapper = EntryMapper::new(mapping);
        let row = Row::new()
            .with("id", 2)
            .with("name", "ignored")
            .with("completion", 90.0)
            .with("parent", 1);

        let entry = mapper.map(&row).unwrap();

        assert_eq!(entry.name, DEFAULT_ENTRY_NAME);
        assert_eq!(entry.completion, 0.0);
        assert_eq!(entry.parent, None);
    }

    #[test]
    fn test_empty_id_yields_none() {
        let mapper = EntryMapper::new(full_mapping());
        assert!(mapper.map(&Row::new().with("id", Value::Null)).is_none());
    }

    #[test]
    fn test_timestamp_rows() {
        let mapping = Arc::new(
            FieldMapping::<NaiveDateTime>::builder()
                .id("id")
                .start("start")
                .end("end")
                .range_policy(TimestampRangePolicy)
                .build()
                .unwrap(),
        );
        let mapper = EntryMapper::new(mapping);
        let row = Row::new()
            .with("id", "task-a")
            .with("start", "2024-02-01")
            .with("end", "2024-02-10 12:00:00");

        let entry = mapper.map(&row).unwrap();

        assert_eq!(entry.id, EntryId::Text("task-a".into()));
        assert_eq!(entry.range.span(), 9.5 * 86_400.0);
    }
}
