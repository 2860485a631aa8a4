//! Live synchronization of the tree with the row store

pub mod id_generator;
pub mod synchronizer;

pub use id_generator::TransientIdGenerator;
pub use synchronizer::{ChangeSynchronizer, EntryField, Skip, SyncOutcome};
