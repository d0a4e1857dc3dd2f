//! Core contracts for pgmask.
//!
//! This crate defines the column-map document, the value-processor catalog,
//! the alphanumeric scrambler, and the consistency caches shared by every
//! worker of a processing run.

pub mod caches;
pub mod catalog;
pub mod error;
pub mod map;
pub mod rng;
pub mod scramble;

pub use caches::ConsistencyCaches;
pub use catalog::{ProcessContext, Processor};
pub use error::{Error, Result};
pub use map::{ColumnMap, DbMap, ProcessorDefinition};
pub use rng::{chunk_rng, generate_seed, hash_seed, resolve_seed};
pub use scramble::{scramble_string, scrub_string};
