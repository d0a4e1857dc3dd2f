use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted while introspecting a database or handling row counts.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Core(#[from] pgmask_core::Error),
}

impl IntrospectError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IntrospectError::Io {
            path: path.into(),
            source,
        }
    }
}
