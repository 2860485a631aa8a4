//! Persistence of entry and relation edits into row stores

pub mod adapter;
pub mod row_index;

pub use adapter::{PersistOutcome, PersistenceAdapter};
pub use row_index::RowIndex;
