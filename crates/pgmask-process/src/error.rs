use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted by the streaming pipeline.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A COPY header line did not match the dump grammar.
    #[error("malformed COPY header: {0}")]
    CopyHeader(String),
    /// Inclusive mode saw a column with no entry in the map.
    #[error("column '{0}' does not exist in the map")]
    MissingColumn(String),
    /// The chunk queue closed before the producer finished.
    #[error("chunk queue closed unexpectedly")]
    QueueClosed,
    /// A pipeline thread panicked.
    #[error("pipeline thread panicked")]
    ThreadPanic,
    /// I/O failure with the offending path.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Core(#[from] pgmask_core::Error),
}

impl ProcessError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProcessError::Io {
            path: path.into(),
            source,
        }
    }
}
