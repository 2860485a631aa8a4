//! Domain layer
//!
//! Port/Adapter pattern: entries, relations and rows are plain data; the
//! row store and its backing database are reached only through `ports`.

pub mod entry;
pub mod ports;
pub mod relation;
pub mod row;
pub mod value;

pub use entry::{Entry, EntryId, Range, RangeValue, DEFAULT_ENTRY_NAME};
pub use ports::{BackingDatabase, RowStore};
pub use relation::{Relation, RelationType};
pub use row::{Origin, Row, RowEvent, RowEventKind, RowPatch};
pub use value::{ColumnInfo, ColumnType, Value};
