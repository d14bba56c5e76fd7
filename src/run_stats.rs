use crate::worker_pool::RecordOutcome;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Counters for one run. Workers produce outcomes; the orchestrator folds them in
/// here once per finished batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunStats {
    pub total_processed: usize,
    pub matched_count: usize,
    pub unmatched_count: usize,
    pub updated_count: usize,
    pub write_failures: usize,
    pub match_failures: usize,
    pub batches_processed: usize,
    pub failed_batches: usize,
    /// Records that were never processed: windows that could not be fetched,
    /// rows without an id, and rows the store stopped returning before the end.
    pub skipped_records: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Written { matched, .. } => {
                self.count_processed(*matched);
                self.updated_count += 1;
            }
            RecordOutcome::WriteFailed { matched, .. } => {
                self.count_processed(*matched);
                self.write_failures += 1;
            }
            RecordOutcome::MatchFailed { .. } => {
                self.match_failures += 1;
            }
        }
    }

    fn count_processed(&mut self, matched: usize) {
        self.total_processed += 1;
        if matched > 0 {
            self.matched_count += 1;
        } else {
            self.unmatched_count += 1;
        }
    }

    pub fn record_failed_batch(&mut self, planned_records: usize) {
        self.failed_batches += 1;
        self.skipped_records += planned_records;
    }

    pub fn record_skipped(&mut self, records: usize) {
        self.skipped_records += records;
    }

    /// Fold a finished batch into the run totals.
    pub fn merge(&mut self, batch: &RunStats) {
        self.total_processed += batch.total_processed;
        self.matched_count += batch.matched_count;
        self.unmatched_count += batch.unmatched_count;
        self.updated_count += batch.updated_count;
        self.write_failures += batch.write_failures;
        self.match_failures += batch.match_failures;
        self.batches_processed += batch.batches_processed;
        self.failed_batches += batch.failed_batches;
        self.skipped_records += batch.skipped_records;
        self.cancelled |= batch.cancelled;
    }

    /// Share of processed records with at least one company, 0 when nothing was processed.
    pub fn match_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.matched_count as f64 / self.total_processed as f64
    }

    pub fn log_summary(&self) {
        info!("{}", "=".repeat(50));
        info!("Company matching run finished");
        for line in self.to_string().lines() {
            info!("{}", line);
        }
        info!("{}", "=".repeat(50));
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Elapsed: {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Processed: {}", self.total_processed)?;
        writeln!(f, "Matched: {}", self.matched_count)?;
        writeln!(f, "Unmatched: {}", self.unmatched_count)?;
        writeln!(f, "Updated: {}", self.updated_count)?;
        write!(f, "Match rate: {:.1}%", self.match_rate() * 100.0)?;
        if self.write_failures > 0 || self.match_failures > 0 {
            write!(
                f,
                "\nFailed records: {} write, {} match",
                self.write_failures, self.match_failures
            )?;
        }
        if self.failed_batches > 0 {
            write!(
                f,
                "\nFailed batches: {} ({} records skipped)",
                self.failed_batches, self.skipped_records
            )?;
        } else if self.skipped_records > 0 {
            write!(f, "\nSkipped records: {}", self.skipped_records)?;
        }
        if self.cancelled {
            write!(f, "\nRun stopped early, totals are partial")?;
        }
        Ok(())
    }
}
