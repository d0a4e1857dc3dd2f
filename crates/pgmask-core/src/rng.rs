use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Error, Result};

/// FNV-style mix of the run seed with a string key.
pub fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Deterministic generator for one chunk of the stream, derived from the
/// run seed and the chunk's total-order position.
///
/// Keying the stream by chunk rather than by worker makes the rewrite
/// independent of scheduling and of the worker count; per-relation
/// consistency for values repeated across chunks comes from the caches,
/// which pin the first rewrite of every value.
pub fn chunk_rng(seed: i64, chunk_index: usize, sub_chunk_index: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(hash_seed(
        seed as u64,
        &format!("chunk.{chunk_index}.{sub_chunk_index}"),
    ))
}

/// Draw a run seed from the operating system entropy source.
pub fn generate_seed() -> Result<i64> {
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| Error::Seed(err.to_string()))?;
    Ok(i64::from_le_bytes(bytes))
}

/// Resolve the seed for a run: a freshly generated one when requested,
/// otherwise the map document's, which must be non-zero.
pub fn resolve_seed(map_seed: i64, generate: bool) -> Result<i64> {
    if generate {
        let seed = generate_seed()?;
        tracing::debug!(event = "seed_generated", seed);
        Ok(seed)
    } else if map_seed == 0 {
        Err(Error::InvalidMap("expected non-zero Seed".to_string()))
    } else {
        tracing::debug!(event = "seed_from_map", seed = map_seed);
        Ok(map_seed)
    }
}
