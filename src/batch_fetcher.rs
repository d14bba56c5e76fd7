use crate::record::{Batch, NewsRecord};
use crate::store::NewsStoreLike;
use crate::TaggerError;
use tracing::{debug, warn};

/// A window that could not be read. Its records are skipped for this run.
#[derive(Debug)]
pub struct FetchFailure {
    pub index: usize,
    pub offset: usize,
    pub planned: usize,
    pub error: TaggerError,
}

/// Walks the news table in id order, one offset/limit window at a time.
///
/// The number of windows is fixed from the record count taken when the run starts;
/// rows appended after that are left for the next run. A window is filled from as
/// many pages as the store needs, since a server may cap rows per response.
pub struct BatchFetcher<'a, S: NewsStoreLike + ?Sized> {
    store: &'a S,
    batch_size: usize,
    total: usize,
    next_index: usize,
    exhausted: bool,
    unfetched: usize,
}

impl<'a, S: NewsStoreLike + ?Sized> BatchFetcher<'a, S> {
    /// Count the records and plan the windows. A failed count is fatal.
    pub fn plan(store: &'a S, batch_size: usize) -> Result<Self, TaggerError> {
        let total = store.count_news().map_err(|e| match e {
            TaggerError::Count(_) => e,
            other => TaggerError::Count(other.to_string()),
        })?;
        Ok(Self::with_total(store, batch_size, total))
    }

    pub fn with_total(store: &'a S, batch_size: usize, total: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            total,
            next_index: 0,
            exhausted: false,
            unfetched: 0,
        }
    }

    pub fn total_records(&self) -> usize {
        self.total
    }

    pub fn planned_batches(&self) -> usize {
        self.total.div_ceil(self.batch_size)
    }

    /// Planned records the store stopped returning before the end of the table.
    pub fn unfetched_records(&self) -> usize {
        self.unfetched
    }

    fn window(&self, index: usize) -> (usize, usize) {
        let offset = index * self.batch_size;
        let planned = self.batch_size.min(self.total.saturating_sub(offset));
        (offset, planned)
    }

    /// Read one window page by page. Returns the records, the rows without an id,
    /// and how many rows the store actually returned.
    fn fill_window(
        &self,
        offset: usize,
        planned: usize,
    ) -> Result<(Vec<NewsRecord>, usize, usize), TaggerError> {
        let mut records = Vec::with_capacity(planned);
        let mut dropped = 0;
        let mut rows = 0;
        while rows < planned {
            let page = self.store.fetch_news(offset + rows, planned - rows)?;
            if page.rows == 0 {
                break;
            }
            rows += page.rows;
            dropped += page.dropped();
            records.extend(page.records);
        }
        Ok((records, dropped, rows))
    }
}

impl<S: NewsStoreLike + ?Sized> Iterator for BatchFetcher<'_, S> {
    type Item = Result<Batch, FetchFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted || self.next_index >= self.planned_batches() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        let (offset, planned) = self.window(index);

        match self.fill_window(offset, planned) {
            Ok((records, dropped, rows)) => {
                if rows == 0 {
                    self.unfetched = self.total - offset;
                    warn!(
                        index,
                        offset,
                        unfetched = self.unfetched,
                        "Empty page before the planned end, stopping"
                    );
                    self.exhausted = true;
                    return None;
                }
                if rows < planned {
                    self.unfetched = self.total.saturating_sub(offset + rows);
                    warn!(
                        index,
                        offset,
                        got = rows,
                        planned,
                        unfetched = self.unfetched,
                        "Store ran out of rows before the planned end"
                    );
                    self.exhausted = true;
                } else {
                    debug!(index, offset, rows, "Fetched window");
                }
                Some(Ok(Batch { index, offset, records, dropped }))
            }
            Err(error) => {
                let error = match error {
                    TaggerError::Fetch { .. } => error,
                    other => TaggerError::Fetch { offset, message: other.to_string() },
                };
                Some(Err(FetchFailure { index, offset, planned, error }))
            }
        }
    }
}
