//! schedule-sync - Entry tree ↔ flat row store synchronization
//!
//! Keeps a hierarchical schedule (a tree of time-ranged entries) consistent
//! with a flat table, and writes tree edits back into it.
//!
//! ## Core Principles
//!
//! 1. **Rows are the source of truth**: the tree is built from rows and follows their events
//! 2. **Single writer**: components get the store as `&mut`; events are queued and pumped
//! 3. **Best-effort persistence**: write failures are logged, never raised
//!
//! ## Flow
//!
//! ```text
//! FieldMapping → EntryMapper → TreeBuilder ──► EntryTree
//!                                 ▲                │
//!           ChangeSynchronizer ◄──┘ row events     │ edits
//!                                                  ▼
//!                      PersistenceAdapter (+ CompletionAggregator) ──► RowStore ──► BackingDatabase
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use schedule_sync::{FieldMapping, InMemoryRowStore, SyncSession, TimestampRangePolicy};
//!
//! let mapping = FieldMapping::builder()
//!     .id("id")
//!     .start("start_date")
//!     .end("end_date")
//!     .completion("progress")
//!     .root("parent_id")
//!     .range_policy(TimestampRangePolicy)
//!     .build()?;
//! let mut session = SyncSession::open(mapping, store)?;
//!
//! session.tree_mut().set_completion(&id, 100.0);
//! session.update_entry(&id);
//! ```

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod mapping;
pub mod persistence;
pub mod relations;
pub mod session;
pub mod sync;
pub mod tree;

pub use error::{ErrorKind, Result, SyncError};

pub use aggregate::CompletionAggregator;
pub use config::{
    AggregationPolicy, ConfigError, DefaultEntryFactory, EntryFactory, FieldMapping,
    MappingDocument, NumericRangePolicy, RangePolicy, RelationFieldMapping,
    TimestampRangePolicy, UpdatePolicy,
};
pub use domain::{
    BackingDatabase, ColumnInfo, ColumnType, Entry, EntryId, Origin, Range, RangeValue,
    Relation, RelationType, Row, RowEvent, RowEventKind, RowPatch, RowStore, Value,
    DEFAULT_ENTRY_NAME,
};
pub use infrastructure::InMemoryRowStore;
#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteDatabase;
pub use mapping::{EntryMapper, RelationMapper};
pub use persistence::{PersistOutcome, PersistenceAdapter};
pub use relations::{RelationEvent, RelationModel};
pub use session::SyncSession;
pub use sync::{ChangeSynchronizer, SyncOutcome, TransientIdGenerator};
pub use tree::{BuildReport, EntryTree, TreeBuilder, TreeEvent};
