//! Infrastructure layer - row store and database adapters

pub mod memory_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use memory_store::InMemoryRowStore;
#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteDatabase;
