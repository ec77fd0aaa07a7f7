//! Error types shared by the sync engine and its collaborators

use std::path::PathBuf;

/// Errors raised while reading from the content repository or a remote file store
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("IO operation failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metadata document {path}: {reason}")]
    InvalidDocument { path: String, reason: String },

    #[error("Path escapes the repository root: {0}")]
    InvalidPath(String),

    #[error("Repository root not found: {0}")]
    RootNotFound(PathBuf),
}

impl RepositoryError {
    pub fn invalid_document<E: std::fmt::Display>(path: &str, e: E) -> Self {
        Self::InvalidDocument {
            path: path.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Errors raised by index lookups and writes
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The adapter cannot answer reverse lookups at all. Treated as a setup problem.
    #[error("Reverse lookup is not available: {0}")]
    LookupUnavailable(String),

    #[error("Index rejected {path}: {reason}")]
    Rejected { path: String, reason: String },

    #[error("Index unavailable: {0}")]
    Unavailable(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl IndexError {
    pub fn rejected<E: std::fmt::Display>(path: &str, e: E) -> Self {
        Self::Rejected {
            path: path.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Errors raised while compiling or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {kind} pattern '{pattern}': {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid reference expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Fatal errors that abort a whole cycle
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Index configuration error: {0}")]
    Index(IndexError),
}
