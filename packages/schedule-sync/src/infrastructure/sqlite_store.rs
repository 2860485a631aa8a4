//! SQLite backing database
//!
//! File-based or in-memory persistence for flushed rows.
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::debug;

use crate::domain::value::parse_timestamp;
use crate::domain::{BackingDatabase, ColumnInfo, ColumnType, Row, Value};
use crate::error::Result;

/// Timestamp text format written to TEXT columns
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// SQLite-based `BackingDatabase`
///
/// Tables are created on demand with one column per declared store column;
/// the key column is the primary key.
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open (or create) the database at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Ok(Self { conn })
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Number of rows currently in `table`
    pub fn count(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl BackingDatabase for SqliteDatabase {
    fn ensure_table(
        &mut self,
        table: &str,
        key_column: &str,
        columns: &[ColumnInfo],
    ) -> Result<()> {
        let definitions: Vec<String> = columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", quote(&c.name), c.column_type.sql_type());
                if c.name == key_column {
                    def.push_str(" PRIMARY KEY");
                }
                def
            })
            .collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(table),
            definitions.join(", ")
        );
        self.conn.execute(&sql, [])?;
        debug!("ensure_table: {}", table);
        Ok(())
    }

    fn upsert(&mut self, table: &str, _key_column: &str, row: &Row) -> Result<()> {
        let names: Vec<String> = row.columns().map(quote).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote(table),
            names.join(", "),
            placeholders.join(", ")
        );
        let values = row.cells().iter().map(|(_, v)| to_sql(v));
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    fn delete(&mut self, table: &str, key_column: &str, key: &Value) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote(table),
            quote(key_column)
        );
        self.conn.execute(&sql, [to_sql(key)])?;
        Ok(())
    }

    fn load(
        &mut self,
        table: &str,
        key_column: &str,
        columns: &[ColumnInfo],
    ) -> Result<Vec<Row>> {
        let names: Vec<String> = columns.iter().map(|c| quote(&c.name)).collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            names.join(", "),
            quote(table),
            quote(key_column)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |sql_row| {
            let mut row = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let raw: SqlValue = sql_row.get(i)?;
                row.set(&column.name, from_sql(raw, column.column_type));
            }
            Ok(row)
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(v) => SqlValue::Integer(*v as i64),
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Timestamp(v) => SqlValue::Text(v.format(TIMESTAMP_FORMAT).to_string()),
        Value::Text(v) => SqlValue::Text(v.clone()),
    }
}

fn from_sql(raw: SqlValue, column_type: ColumnType) -> Value {
    match (raw, column_type) {
        (SqlValue::Null, _) => Value::Null,
        (SqlValue::Integer(v), ColumnType::Boolean) => Value::Bool(v != 0),
        (SqlValue::Integer(v), ColumnType::Real) => Value::Real(v as f64),
        (SqlValue::Integer(v), _) => Value::Int(v),
        (SqlValue::Real(v), _) => Value::Real(v),
        (SqlValue::Text(s), ColumnType::Timestamp) => match parse_timestamp(&s) {
            Some(ts) => Value::Timestamp(ts),
            None => Value::Text(s),
        },
        (SqlValue::Text(s), _) => Value::Text(s),
        (SqlValue::Blob(b), _) => Value::Text(String::from_utf8_lossy(&b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn columns() -> Vec<ColumnInfo> {
        vec![
            ColumnInfo::new("id", ColumnType::Integer),
            ColumnInfo::new("name", ColumnType::Text),
            ColumnInfo::new("start", ColumnType::Timestamp),
            ColumnInfo::new("completion", ColumnType::Real),
            ColumnInfo::new("done", ColumnType::Boolean),
        ]
    }

    fn sample(id: i64, name: &str) -> Row {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        Row::new()
            .with("id", id)
            .with("name", name)
            .with("start", start)
            .with("completion", 50)
            .with("done", false)
    }

    #[test]
    fn test_upsert_load_delete() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        db.ensure_table("entries", "id", &columns()).unwrap();

        db.upsert("entries", "id", &sample(2, "b")).unwrap();
        db.upsert("entries", "id", &sample(1, "a")).unwrap();
        db.upsert("entries", "id", &sample(1, "a2")).unwrap();

        let rows = db.load("entries", "id", &columns()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), &Value::Text("a2".into()));
        assert_eq!(rows[0].get("completion"), &Value::Real(50.0));
        assert_eq!(rows[0].get("done"), &Value::Bool(false));
        assert_eq!(rows[0].get("start"), sample(1, "a").get("start"));

        db.delete("entries", "id", &Value::Int(2)).unwrap();
        assert_eq!(db.count("entries").unwrap(), 1);
    }

    #[test]
    fn test_file_database_persists() {
        let file = NamedTempFile::new().unwrap();
        {
            let mut db = SqliteDatabase::open(file.path()).unwrap();
            db.ensure_table("entries", "id", &columns()).unwrap();
            db.upsert("entries", "id", &sample(7, "kept")).unwrap();
        }

        let mut db = SqliteDatabase::open(file.path()).unwrap();
        db.ensure_table("entries", "id", &columns()).unwrap();
        let rows = db.load("entries", "id", &columns()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), &Value::Int(7));
    }

    #[test]
    fn test_quoted_identifiers() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        let columns = vec![
            ColumnInfo::new("id", ColumnType::Integer),
            ColumnInfo::new("end", ColumnType::Real),
        ];
        db.ensure_table("order", "id", &columns).unwrap();
        db.upsert("order", "id", &Row::new().with("id", 1).with("end", 2.5))
            .unwrap();

        assert_eq!(db.count("order").unwrap(), 1);
    }
}
