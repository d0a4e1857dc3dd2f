use std::path::PathBuf;

use thiserror::Error;

/// Core error type shared across pgmask crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The map document violates its invariants.
    #[error("invalid map: {0}")]
    InvalidMap(String),
    /// A value could not be rewritten by its processor.
    #[error("processor error: {0}")]
    Processor(String),
    /// Malformed input value.
    #[error("format error: {0}")]
    Format(String),
    /// Failure drawing entropy for a generated seed.
    #[error("seed error: {0}")]
    Seed(String),
    /// I/O failure with the offending path.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Map document (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for results returned by pgmask crates.
pub type Result<T> = std::result::Result<T, Error>;
