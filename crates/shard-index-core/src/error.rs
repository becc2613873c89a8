//! Error taxonomy shared by every layer of the shard index.
//!
//! Callers react differently to a missing source, a malformed input, and a
//! version-mismatched artifact, so each gets its own variant instead of a
//! stringly-typed error.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required directory or source file does not exist.
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// Input is well-formed but unusable (no sections, conflicting flags, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Manifest or store was written by an incompatible schema version.
    #[error("unsupported schema_version={found}; expected {expected}")]
    Schema { found: String, expected: i64 },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid regex pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failure reported by a storage backend (e.g. SQLite).
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }

    pub fn store(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Store(Box::new(source))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
