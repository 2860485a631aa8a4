//! Mapping document I/O (YAML)
//!
//! ```yaml
//! version: 1
//! entries:
//!   id: id
//!   start: start_date
//!   end: end_date
//!   description: name
//!   completion: progress
//!   root: parent_id
//!   root_identifier: 0
//!   db_sync: true
//! relations:
//!   id: id
//!   entry_id: entry_id
//!   relation_root: predecessor_id
//!   relation_type: kind
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, ConfigResult};
use super::mapping::{FieldMapping, RelationFieldMapping};
use super::policy::{AggregationPolicy, RangePolicy, UpdatePolicy};
use crate::domain::{EntryId, RangeValue, Value};

const SUPPORTED_VERSIONS: &[u32] = &[1];

/// YAML schema v1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDocument {
    /// Schema version (always 1 for v1)
    #[serde(default)]
    pub version: Option<u32>,

    pub entries: EntryColumns,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<RelationFieldMapping>,
}

/// Entry-table section of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryColumns {
    pub id: String,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default)]
    pub root_identifier: Value,
    #[serde(default)]
    pub db_sync: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic_root: Option<EntryId>,
    #[serde(default)]
    pub update_policy: UpdatePolicy,
    #[serde(default)]
    pub aggregation: AggregationPolicy,
}

impl MappingDocument {
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let doc: MappingDocument = serde_yaml::from_str(content)?;

        // Version check
        match doc.version {
            None => return Err(ConfigError::MissingVersion),
            Some(v) if !SUPPORTED_VERSIONS.contains(&v) => {
                return Err(ConfigError::UnsupportedVersion {
                    found: v,
                    supported: SUPPORTED_VERSIONS.to_vec(),
                })
            }
            Some(_) => {}
        }

        if let Some(relations) = &doc.relations {
            relations.validate()?;
        }
        Ok(doc)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self).map_err(ConfigError::Yaml)
    }

    /// Entry mapping with the given range policy and the default entry factory
    pub fn entry_mapping<T: RangeValue>(
        &self,
        range_policy: impl RangePolicy<T> + 'static,
    ) -> ConfigResult<FieldMapping<T>> {
        let e = &self.entries;
        let mut builder = FieldMapping::builder()
            .id(&e.id)
            .start(&e.start)
            .end(&e.end)
            .root_identifier(e.root_identifier.clone())
            .db_sync(e.db_sync)
            .update_policy(e.update_policy)
            .aggregation(e.aggregation)
            .range_policy(range_policy);

        if let Some(c) = &e.description {
            builder = builder.description(c);
        }
        if let Some(c) = &e.completion {
            builder = builder.completion(c);
        }
        if let Some(c) = &e.root {
            builder = builder.root(c);
        }
        if let Some(id) = &e.synthetic_root {
            builder = builder.synthetic_root(id.clone());
        }
        builder.build()
    }

    pub fn relation_mapping(&self) -> ConfigResult<RelationFieldMapping> {
        self.relations.clone().ok_or(ConfigError::MissingRelations)
    }
}
