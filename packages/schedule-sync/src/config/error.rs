//! Configuration error types

use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required semantic role without a column
    #[error("Missing column for role '{role}'. Every mapping needs id, start and end columns.")]
    MissingColumn { role: &'static str },

    /// One column bound to two roles
    #[error("Column '{column}' is bound to both '{first}' and '{second}'")]
    DuplicateColumn {
        column: String,
        first: &'static str,
        second: &'static str,
    },

    /// Column not declared by the row store the mapping is used with
    #[error("Column '{column}' (role '{role}') is not declared by table '{table}'")]
    UndeclaredColumn {
        column: String,
        role: &'static str,
        table: String,
    },

    /// Builder finished without a range policy
    #[error("No range policy configured. Call `range_policy(..)` before `build()`.")]
    MissingRangePolicy,

    /// Missing version field in YAML
    #[error("Missing 'version' field in mapping file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported mapping version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// Relation mapping requested but absent from the document
    #[error("Mapping file has no 'relations' section")]
    MissingRelations,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
