use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rand::Rng;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Attempts allowed to find an unused value for the unique scrambler.
const MAX_UNIQUE_ATTEMPTS: usize = 20;

/// Attempts allowed to draw a non-nil identifier.
const MAX_UUID_ATTEMPTS: usize = 10;

/// Process-lifetime rewrite caches shared by every worker of a run.
///
/// The caches are owned by the pipeline and handed to workers behind an
/// `Arc`; entries are populated on demand, never evicted, and dropped with
/// the run. The alpha map keeps a coarse lock only to resolve its per-parent
/// buckets; a miss holds the bucket lock across generate + insert so
/// concurrent workers agree on a single first writer.
#[derive(Debug, Default)]
pub struct ConsistencyCaches {
    alpha: Mutex<HashMap<String, AlphaBucket>>,
    uuids: Mutex<HashMap<Uuid, Uuid>>,
    issued: Mutex<HashMap<String, IssuedSet>>,
}

type AlphaBucket = Arc<Mutex<HashMap<String, String>>>;
type IssuedSet = Arc<Mutex<HashSet<String>>>;

impl ConsistencyCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable rewrite of `input` under a parent cache key. The first miss
    /// runs `generate`; later hits return the cached value, which is what
    /// keeps foreign-key joins intact across relations.
    pub fn alpha_get<F>(&self, parent_key: &str, input: &str, generate: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let bucket = {
            let mut outer = self.alpha.lock().map_err(|_| lock_poisoned())?;
            Arc::clone(outer.entry(parent_key.to_string()).or_default())
        };

        let mut bucket = bucket.lock().map_err(|_| lock_poisoned())?;
        if let Some(found) = bucket.get(input) {
            return Ok(found.clone());
        }
        let value = generate()?;
        bucket.insert(input.to_string(), value.clone());
        Ok(value)
    }

    /// Stable identifier mapping. Identifiers are universally unique by
    /// definition, so one global map suffices; a miss draws a fresh non-nil
    /// identifier from the caller's generator while holding the lock.
    pub fn uuid_get(&self, input: Uuid, rng: &mut impl Rng) -> Result<Uuid> {
        let mut map = self.uuids.lock().map_err(|_| lock_poisoned())?;
        if let Some(found) = map.get(&input) {
            return Ok(*found);
        }

        let mut fresh = Uuid::from_bytes(rng.r#gen());
        let mut attempts = 1;
        while fresh.is_nil() {
            if attempts >= MAX_UUID_ATTEMPTS {
                return Err(Error::Processor(format!(
                    "unable to generate a non-nil UUID after {MAX_UUID_ATTEMPTS} attempts"
                )));
            }
            fresh = Uuid::from_bytes(rng.r#gen());
            attempts += 1;
        }

        map.insert(input, fresh);
        Ok(fresh)
    }

    /// Run `generate` until it yields a value never issued under `table_key`,
    /// retrying up to the attempt bound before failing.
    pub fn unique_get<F>(&self, table_key: &str, mut generate: F) -> Result<String>
    where
        F: FnMut() -> Result<String>,
    {
        let issued = {
            let mut outer = self.issued.lock().map_err(|_| lock_poisoned())?;
            Arc::clone(outer.entry(table_key.to_string()).or_default())
        };

        let mut issued = issued.lock().map_err(|_| lock_poisoned())?;
        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            let candidate = generate()?;
            if issued.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }

        Err(Error::Processor(format!(
            "{table_key}: unable to generate a unique value after {MAX_UNIQUE_ATTEMPTS} attempts"
        )))
    }
}

fn lock_poisoned() -> Error {
    Error::Processor("consistency cache lock poisoned".to_string())
}
