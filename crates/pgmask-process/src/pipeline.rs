use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;

use crossbeam_channel::bounded;

use pgmask_core::{ConsistencyCaches, DbMap, resolve_seed};

use crate::chunk::{MAX_LINES_PER_CHUNK, produce_chunks};
use crate::error::ProcessError;
use crate::merge::merge_parts;
use crate::worker::run_worker;

/// Arguments for one processing run.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// SQL injected verbatim before the processed dump.
    pub preprocess_file: Option<PathBuf>,
    /// SQL injected verbatim after the processed dump.
    pub postprocess_file: Option<PathBuf>,
    /// Draw the seed from OS entropy instead of the map document.
    pub generate_seed: bool,
    /// Fail when a column has no entry in the map.
    pub inclusive: bool,
    /// Worker count; 0 means one per available core.
    pub workers: usize,
    /// Directory holding the intermediate partial files.
    pub work_dir: PathBuf,
}

impl ProcessOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            preprocess_file: None,
            postprocess_file: None,
            generate_seed: false,
            inclusive: false,
            workers: 0,
            work_dir: PathBuf::from("."),
        }
    }

    fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1)
            .max(1)
    }
}

/// Process a dump file concurrently according to the map.
///
/// One producer thread slices the source into chunks on a bounded queue of
/// twice the worker count; N workers rewrite chunks into partial files; the
/// merger then concatenates the partial files in total order. A fatal error
/// anywhere terminates the run and leaves the partial files on disk for
/// inspection.
pub fn process_dump(map: &DbMap, options: &ProcessOptions) -> Result<(), ProcessError> {
    map.validate()?;
    let seed = resolve_seed(map.seed, options.generate_seed)?;
    let workers = options.worker_count();

    let source = File::open(&options.source)
        .map_err(|err| ProcessError::io(&options.source, err))?;
    let reader = BufReader::new(source);

    let caches = ConsistencyCaches::new();
    let (sender, receiver) = bounded(workers * 2);

    tracing::info!(
        event = "process_started",
        source = %options.source.display(),
        destination = %options.destination.display(),
        workers,
        inclusive = options.inclusive,
    );

    let mut producer_result = Ok(0);
    let mut worker_results = Vec::with_capacity(workers);

    thread::scope(|scope| {
        let producer = scope.spawn(|| {
            // Moving the sender in closes the queue when the producer
            // finishes, which is what tells the workers to drain and exit.
            let sender = sender;
            produce_chunks(
                reader,
                &options.source,
                &sender,
                options.inclusive,
                MAX_LINES_PER_CHUNK,
            )
        });

        let handles: Vec<_> = (0..workers)
            .map(|index| {
                let receiver = receiver.clone();
                let caches = &caches;
                let work_dir = options.work_dir.as_path();
                scope.spawn(move || {
                    run_worker(index, &receiver, map, caches, seed, work_dir)
                })
            })
            .collect();

        producer_result = producer.join().unwrap_or(Err(ProcessError::ThreadPanic));
        for handle in handles {
            worker_results.push(handle.join().unwrap_or(Err(ProcessError::ThreadPanic)));
        }
    });

    // Worker failures explain producer queue-closed errors, so they win.
    for result in worker_results {
        result?;
    }
    let chunk_count = producer_result?;

    merge_parts(
        &options.work_dir,
        &options.destination,
        options.preprocess_file.as_deref(),
        options.postprocess_file.as_deref(),
    )?;

    tracing::info!(event = "process_finished", chunks = chunk_count);
    Ok(())
}
