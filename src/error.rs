//! Error types for the configuration subsystem

use semver::Version;
use thiserror::Error;

use crate::value::ValueKind;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration subsystem errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("key {field} must not be empty")]
    EmptyKeyField { field: &'static str },

    #[error("duplicate key name in schema: {0}")]
    DuplicateKey(String),

    #[error("key '{key}' does not belong to this store's schema")]
    ForeignKey { key: String },

    #[error("key '{key}' is declared as {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("value for key '{key}' was rejected by its validator")]
    Validation { key: String },

    #[error("persisted value for key '{key}' is null")]
    NullValue { key: String },

    #[error("persisted version {persisted} is incompatible with declared version {declared}")]
    IncompatibleVersion {
        persisted: Version,
        declared: Version,
    },

    #[error("store for mod '{mod_id}' is blocked on a version conflict; reload before saving")]
    SaveBlocked { mod_id: String },

    #[error("configuration document for mod '{mod_id}' is corrupt: {reason}")]
    CorruptDocument { mod_id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}
