use crate::matcher::match_record;
use crate::record::{Batch, MatchResult, NewsRecord, RecordId};
use crate::reference::ReferenceSet;
use crate::run_stats::RunStats;
use crate::store::NewsStoreLike;
use crate::writer::ResultWriter;
use crate::TaggerError;
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, instrument, warn};

pub type MatchFn = fn(&NewsRecord, &ReferenceSet, usize) -> MatchResult;

/// What happened to one record inside a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Written { id: RecordId, matched: usize },
    WriteFailed { id: RecordId, matched: usize, error: String },
    MatchFailed { id: RecordId, error: String },
}

/// Fixed set of worker threads shared by every batch of a run.
///
/// Each worker takes a record, matches it and writes the result before taking the
/// next one, so at most `workers` records are in flight at any time.
pub struct WorkerPool {
    jobs: Option<Sender<NewsRecord>>,
    outcomes: Receiver<RecordOutcome>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new<S>(
        workers: usize,
        reference: Arc<ReferenceSet>,
        writer: ResultWriter<S>,
        min_occurrences: usize,
    ) -> Result<Self, TaggerError>
    where
        S: NewsStoreLike + ?Sized + 'static,
    {
        Self::with_matcher(workers, reference, writer, min_occurrences, match_record)
    }

    pub fn with_matcher<S>(
        workers: usize,
        reference: Arc<ReferenceSet>,
        writer: ResultWriter<S>,
        min_occurrences: usize,
        matcher: MatchFn,
    ) -> Result<Self, TaggerError>
    where
        S: NewsStoreLike + ?Sized + 'static,
    {
        let workers = workers.max(1);
        let (job_tx, job_rx) = crossbeam_channel::bounded::<NewsRecord>(workers);
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<RecordOutcome>();

        let mut handles = Vec::with_capacity(workers);
        for worker_idx in 0..workers {
            let rx = job_rx.clone();
            let tx = outcome_tx.clone();
            let reference = Arc::clone(&reference);
            let writer = writer.clone();
            let handle = thread::Builder::new()
                .name(format!("tagger-worker-{}", worker_idx))
                .spawn(move || {
                    for record in rx.iter() {
                        let outcome = handle_record(&record, &reference, &writer, min_occurrences, matcher);
                        if tx.send(outcome).is_err() {
                            break;
                        }
                    }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            handles,
        })
    }

    pub fn width(&self) -> usize {
        self.handles.len()
    }

    /// Run every record of the batch through the workers and wait for all of them.
    #[instrument(skip_all, fields(batch = batch.index, records = batch.len()))]
    pub fn process_batch(&self, batch: Batch) -> RunStats {
        let mut stats = RunStats::new();
        let expected = batch.len();
        let Some(jobs) = self.jobs.as_ref() else {
            error!("Worker pool already shut down");
            stats.match_failures += expected;
            return stats;
        };

        // Outcomes are unbounded, so workers never block and the feeder only waits for a free worker.
        for record in batch.records {
            if jobs.send(record).is_err() {
                break;
            }
        }

        let mut received = 0;
        while received < expected {
            match self.outcomes.recv() {
                Ok(outcome) => {
                    stats.record(&outcome);
                    received += 1;
                }
                Err(_) => break,
            }
        }

        if received < expected {
            error!(lost = expected - received, "Workers stopped before finishing the batch");
            stats.match_failures += expected - received;
        }
        stats.batches_processed = 1;
        debug!(
            processed = stats.total_processed,
            updated = stats.updated_count,
            "Batch finished"
        );
        stats
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.jobs.take());
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }
    }
}

fn handle_record<S: NewsStoreLike + ?Sized>(
    record: &NewsRecord,
    reference: &ReferenceSet,
    writer: &ResultWriter<S>,
    min_occurrences: usize,
    matcher: MatchFn,
) -> RecordOutcome {
    let result = match panic::catch_unwind(AssertUnwindSafe(|| matcher(record, reference, min_occurrences))) {
        Ok(result) => result,
        Err(payload) => {
            let error = TaggerError::Match {
                id: record.id.to_string(),
                message: panic_message(payload.as_ref()),
            };
            error!("{}", error);
            return RecordOutcome::MatchFailed { id: record.id.clone(), error: error.to_string() };
        }
    };

    let matched = result.matched.len();
    match writer.write(&result) {
        Ok(()) => RecordOutcome::Written { id: result.record_id, matched },
        Err(e) => {
            warn!("{}", e);
            RecordOutcome::WriteFailed { id: result.record_id, matched, error: e.to_string() }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "matcher panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DEFAULT_MIN_OCCURRENCES;
    use crate::record::CompanyRow;
    use crate::store::InMemoryNewsStore;
    use std::time::Duration;

    fn setup(records: Vec<NewsRecord>) -> (Arc<InMemoryNewsStore>, Arc<ReferenceSet>) {
        let companies = vec![CompanyRow::new("Acme"), CompanyRow::new("Globex")];
        let reference = Arc::new(ReferenceSet::from_rows(&companies));
        (Arc::new(InMemoryNewsStore::new(companies, records)), reference)
    }

    fn batch_of(store: &InMemoryNewsStore) -> Batch {
        Batch {
            index: 0,
            offset: 0,
            records: store.fetch_news(0, 1000).unwrap().records,
            dropped: 0,
        }
    }

    #[test]
    fn test_batch_is_complete_when_call_returns() {
        let records = (1..=25)
            .map(|i| {
                let text = if i % 2 == 0 { "Acme and Acme" } else { "nothing here" };
                NewsRecord::new(i, text)
            })
            .collect();
        let (store, reference) = setup(records);
        let pool = WorkerPool::new(3, reference, ResultWriter::new(Arc::clone(&store)), DEFAULT_MIN_OCCURRENCES)
            .unwrap();

        let stats = pool.process_batch(batch_of(&store));
        assert_eq!(stats.total_processed, 25);
        assert_eq!(stats.matched_count, 12);
        assert_eq!(stats.unmatched_count, 13);
        assert_eq!(stats.updated_count, 25);
        assert_eq!(store.write_attempts().len(), 25);
        assert_eq!(store.record(&RecordId::Int(2)).unwrap().companies, vec!["Acme".to_string()]);
    }

    #[test]
    fn test_concurrency_never_exceeds_width() {
        let records = (1..=12).map(|i| NewsRecord::new(i, "Globex Globex")).collect();
        let (store, reference) = setup(records);
        store.set_write_delay(Duration::from_millis(20));
        let pool = WorkerPool::new(3, reference, ResultWriter::new(Arc::clone(&store)), DEFAULT_MIN_OCCURRENCES)
            .unwrap();
        assert_eq!(pool.width(), 3);

        pool.process_batch(batch_of(&store));
        assert!(store.max_writes_in_flight() <= 3);
        assert!(store.max_writes_in_flight() >= 1);
    }

    #[test]
    fn test_write_failure_is_per_record() {
        let records = (1..=4).map(|i| NewsRecord::new(i, "Acme Acme")).collect();
        let (store, reference) = setup(records);
        store.fail_write_for(2);
        let pool = WorkerPool::new(2, reference, ResultWriter::new(Arc::clone(&store)), DEFAULT_MIN_OCCURRENCES)
            .unwrap();

        let stats = pool.process_batch(batch_of(&store));
        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.updated_count, 3);
        assert_eq!(stats.write_failures, 1);
        assert!(store.record(&RecordId::Int(2)).unwrap().companies.is_empty());
    }

    fn exploding_matcher(record: &NewsRecord, reference: &ReferenceSet, min: usize) -> MatchResult {
        if record.content == "boom" {
            panic!("bad record");
        }
        match_record(record, reference, min)
    }

    #[test]
    fn test_matcher_panic_does_not_abort_siblings() {
        let records = vec![
            NewsRecord::new(1, "Acme Acme"),
            NewsRecord::new(2, "boom"),
            NewsRecord::new(3, "Globex Globex"),
        ];
        let (store, reference) = setup(records);
        let pool = WorkerPool::with_matcher(
            2,
            reference,
            ResultWriter::new(Arc::clone(&store)),
            DEFAULT_MIN_OCCURRENCES,
            exploding_matcher,
        )
        .unwrap();

        let stats = pool.process_batch(batch_of(&store));
        assert_eq!(stats.match_failures, 1);
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.updated_count, 2);
        assert!(!store.write_attempts().contains(&RecordId::Int(2)));

        // the pool is still usable afterwards
        let again = pool.process_batch(batch_of(&store));
        assert_eq!(again.updated_count, 2);
    }
}
