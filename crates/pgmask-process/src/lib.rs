//! Streaming transformation of logical dump files.
//!
//! One producer slices the dump into bounded, context-carrying chunks; a
//! pool of workers rewrites each chunk through the processor catalog into a
//! partial file; a single-threaded merger reassembles the partial files in
//! total order.

pub mod chunk;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod worker;

pub use chunk::{Chunk, CopyContext, LineKind, MAX_LINES_PER_CHUNK};
pub use error::ProcessError;
pub use pipeline::{ProcessOptions, process_dump};
