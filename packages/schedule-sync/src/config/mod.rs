//! Mapping configuration
//!
//! One `FieldMapping` per tree (entry table) and one `RelationFieldMapping`
//! for the relation table. Mappings are built in code or loaded from a
//! versioned YAML document; range and entry-construction policies bind the
//! endpoint type `T` and are always supplied in code.

pub mod error;
pub mod io;
pub mod mapping;
pub mod policy;

pub use error::{ConfigError, ConfigResult};
pub use io::{EntryColumns, MappingDocument};
pub use mapping::{FieldMapping, FieldMappingBuilder, RelationFieldMapping};
pub use policy::{
    AggregationPolicy, DefaultEntryFactory, EntryFactory, NumericRangePolicy, RangePolicy,
    TimestampRangePolicy, UpdatePolicy,
};
