//! Row store ports (trait interfaces)
//!
//! - `RowStore`: the flat table the tree is synchronized with
//! - `BackingDatabase`: durable target that changed rows are flushed to
//!
//! Both are synchronous: every call completes on the owning thread.

use super::row::{Origin, Row, RowEvent, RowPatch};
use super::value::{ColumnInfo, Value};
use crate::error::{Result, SyncError};

/// Flat table consumed by the synchronizer and the persistence adapter
pub trait RowStore {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Schema
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Table name
    fn table(&self) -> &str;

    /// Declared columns, in order
    fn columns(&self) -> &[ColumnInfo];

    /// Column lookup by name
    fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Empty row with every declared column set to `Null`
    fn new_row(&self) -> Row {
        Row::with_columns(self.columns().iter().map(|c| c.name.as_str()))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Access
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn row_count(&self) -> usize;

    /// Random-access row lookup
    fn row(&self, index: usize) -> Option<&Row>;

    /// Snapshot of all rows in store order
    fn rows(&self) -> Vec<Row> {
        (0..self.row_count())
            .filter_map(|i| self.row(i).cloned())
            .collect()
    }

    /// Position of the first row whose `column` equals `value`
    fn position(&self, column: &str, value: &Value) -> Option<usize> {
        (0..self.row_count()).find(|&i| self.row(i).is_some_and(|r| r.get(column) == value))
    }

    /// Largest non-null value of `column`
    fn max_value(&self, column: &str) -> Option<Value> {
        (0..self.row_count())
            .filter_map(|i| self.row(i))
            .map(|r| r.get(column))
            .filter(|v| !v.is_null())
            .max_by(|a, b| a.sort_cmp(b))
            .cloned()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Mutation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Append a row; auto-generated columns left `Null` are filled by the store.
    ///
    /// `sync` marks the row as changed for the backing database.
    /// Returns the position of the new row.
    fn insert_row(&mut self, row: Row, sync: bool, origin: Origin) -> Result<usize>;

    /// Apply `patch` to the row at `index`
    fn update_row(&mut self, index: usize, patch: &RowPatch, sync: bool, origin: Origin)
        -> Result<()>;

    /// Remove the row at `index`, returning it
    fn delete_row(&mut self, index: usize, sync: bool, origin: Origin) -> Result<Row>;

    /// Write every row marked as changed to the backing database.
    ///
    /// Returns the number of rows written. On failure the changes stay
    /// queued for the next flush.
    fn flush_changed(&mut self) -> Result<usize>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Events
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Take all queued CRUD events, oldest first
    fn drain_events(&mut self) -> Vec<RowEvent>;

    /// Fail with `UnknownColumn` unless `column` is declared
    fn require_column(&self, column: &str) -> Result<&ColumnInfo> {
        self.column(column)
            .ok_or_else(|| SyncError::unknown_column(self.table(), column))
    }
}

/// Durable database behind a row store
pub trait BackingDatabase {
    /// Create the table if missing
    fn ensure_table(&mut self, table: &str, key_column: &str, columns: &[ColumnInfo])
        -> Result<()>;

    /// Insert or replace the row keyed by `key_column`
    fn upsert(&mut self, table: &str, key_column: &str, row: &Row) -> Result<()>;

    /// Delete the row keyed by `key`
    fn delete(&mut self, table: &str, key_column: &str, key: &Value) -> Result<()>;

    /// All rows of `table`, ordered by `key_column`
    fn load(&mut self, table: &str, key_column: &str, columns: &[ColumnInfo]) -> Result<Vec<Row>>;
}
