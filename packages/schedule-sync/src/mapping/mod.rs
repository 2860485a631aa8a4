//! Row ↔ domain projections

pub mod entry_mapper;
pub mod relation_mapper;

pub use entry_mapper::EntryMapper;
pub use relation_mapper::RelationMapper;
