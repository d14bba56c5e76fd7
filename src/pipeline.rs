use crate::batch_fetcher::BatchFetcher;
use crate::config::TaggerConfig;
use crate::reference::load_reference_set;
use crate::run_stats::RunStats;
use crate::store::NewsStoreLike;
use crate::worker_pool::WorkerPool;
use crate::writer::ResultWriter;
use crate::TaggerError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Shared stop flag, checked between batches only.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub batch_size: usize,
    pub workers: usize,
    pub min_occurrences: usize,
    pub max_runtime: Option<Duration>,
    pub cancel: CancelToken,
}

impl RunOptions {
    pub fn from_config(config: &TaggerConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            workers: config.workers,
            min_occurrences: config.min_occurrences,
            max_runtime: config.max_runtime,
            cancel: CancelToken::new(),
        }
    }

    fn should_stop(&self, started: Instant) -> bool {
        self.cancel.is_cancelled() || self.max_runtime.is_some_and(|limit| started.elapsed() >= limit)
    }
}

/// One full refresh: load companies, then match and rewrite every news record.
///
/// Only failures that make the run meaningless are returned as errors; failed
/// batches and records are counted in the returned stats.
pub fn run<S>(store: Arc<S>, options: &RunOptions) -> Result<RunStats, TaggerError>
where
    S: NewsStoreLike + ?Sized + 'static,
{
    let started = Instant::now();
    info!("{}", "=".repeat(50));
    info!("Starting company matching run");
    info!("{}", "=".repeat(50));

    let reference = Arc::new(load_reference_set(store.as_ref())?);
    let mut fetcher = BatchFetcher::plan(store.as_ref(), options.batch_size)?;
    let total = fetcher.total_records();

    let mut stats = RunStats::new();
    if total == 0 {
        info!("No news records to process");
        stats.elapsed = started.elapsed();
        stats.log_summary();
        return Ok(stats);
    }

    info!(
        total,
        batches = fetcher.planned_batches(),
        batch_size = options.batch_size,
        workers = options.workers,
        "Planned run"
    );

    let pool = WorkerPool::new(
        options.workers,
        reference,
        ResultWriter::new(Arc::clone(&store)),
        options.min_occurrences,
    )?;

    loop {
        if options.should_stop(started) {
            warn!(
                processed = stats.total_processed,
                "Run cancelled between batches, reporting partial totals"
            );
            stats.cancelled = true;
            break;
        }
        let Some(item) = fetcher.next() else {
            break;
        };
        match item {
            Ok(batch) => {
                let dropped = batch.dropped;
                let batch_stats = pool.process_batch(batch);
                stats.merge(&batch_stats);
                stats.record_skipped(dropped);
            }
            Err(failure) => {
                error!(
                    batch = failure.index,
                    skipped = failure.planned,
                    "{}",
                    failure.error
                );
                stats.record_failed_batch(failure.planned);
            }
        }
        let done = stats.total_processed + stats.skipped_records;
        info!(
            "Progress: {}/{} ({:.1}%)",
            stats.total_processed,
            total,
            done as f64 / total as f64 * 100.0
        );
    }
    drop(pool);

    let unfetched = fetcher.unfetched_records();
    if unfetched > 0 {
        warn!(unfetched, "Records planned at start were never returned by the store");
        stats.record_skipped(unfetched);
    }

    stats.elapsed = started.elapsed();
    stats.log_summary();

    if stats.batches_processed == 0 && stats.failed_batches > 0 {
        return Err(TaggerError::StoreUnreachable(format!(
            "all {} batch fetches failed",
            stats.failed_batches
        )));
    }
    Ok(stats)
}
