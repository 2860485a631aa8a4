//! Shared fixtures for schedule-sync integration tests

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use schedule_sync::{
    BackingDatabase, ColumnInfo, ColumnType, FieldMapping, InMemoryRowStore, Origin,
    RelationFieldMapping, Result, Row, RowStore, SyncError, TimestampRangePolicy, Value,
};

/// Midnight of January `day`, 2024
pub fn day(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid fixture date")
}

pub fn entry_columns() -> Vec<ColumnInfo> {
    vec![
        ColumnInfo::new("id", ColumnType::Integer),
        ColumnInfo::new("start_date", ColumnType::Timestamp),
        ColumnInfo::new("end_date", ColumnType::Timestamp),
        ColumnInfo::new("name", ColumnType::Text),
        ColumnInfo::new("progress", ColumnType::Real),
        ColumnInfo::new("parent_id", ColumnType::Integer),
    ]
}

pub fn relation_columns() -> Vec<ColumnInfo> {
    vec![
        ColumnInfo::new("id", ColumnType::Integer),
        ColumnInfo::new("entry_id", ColumnType::Integer),
        ColumnInfo::new("predecessor_id", ColumnType::Integer),
        ColumnInfo::new("kind", ColumnType::Integer),
    ]
}

pub fn mapping_builder() -> schedule_sync::config::FieldMappingBuilder<NaiveDateTime> {
    FieldMapping::builder()
        .id("id")
        .start("start_date")
        .end("end_date")
        .description("name")
        .completion("progress")
        .root("parent_id")
        .range_policy(TimestampRangePolicy)
}

pub fn mapping() -> FieldMapping<NaiveDateTime> {
    mapping_builder().build().expect("valid mapping")
}

pub fn relation_mapping() -> RelationFieldMapping {
    RelationFieldMapping::new("id", "entry_id", "predecessor_id", "kind")
}

pub fn entry_row(
    id: i64,
    start: u32,
    end: u32,
    parent: impl Into<Value>,
    progress: f64,
) -> Row {
    Row::new()
        .with("id", id)
        .with("start_date", day(start))
        .with("end_date", day(end))
        .with("name", format!("Task {}", id))
        .with("progress", progress)
        .with("parent_id", parent)
}

/// Entry store holding `rows`, loaded authoritatively
pub fn entry_store(rows: Vec<Row>) -> InMemoryRowStore {
    let mut store = InMemoryRowStore::new("entries", entry_columns());
    for row in rows {
        store
            .insert_row(row, false, Origin::Load)
            .expect("fixture row");
    }
    store
}

pub fn relation_store() -> InMemoryRowStore {
    InMemoryRowStore::new("relations", relation_columns())
}

/// Backing database that accepts the table but rejects every write
pub struct OfflineDatabase;

impl BackingDatabase for OfflineDatabase {
    fn ensure_table(&mut self, _: &str, _: &str, _: &[ColumnInfo]) -> Result<()> {
        Ok(())
    }

    fn upsert(&mut self, _: &str, _: &str, _: &Row) -> Result<()> {
        Err(SyncError::database("offline"))
    }

    fn delete(&mut self, _: &str, _: &str, _: &Value) -> Result<()> {
        Err(SyncError::database("offline"))
    }

    fn load(&mut self, _: &str, _: &str, _: &[ColumnInfo]) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }
}
