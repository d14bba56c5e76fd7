use crate::record::{CompanyName, CompanyRow, NewsPage, NewsRecord, RecordId};
use crate::TaggerError;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Operations the pipeline needs from the shared database.
pub trait NewsStoreLike: Send + Sync {
    fn load_companies(&self) -> Result<Vec<CompanyRow>, TaggerError>;
    fn count_news(&self) -> Result<usize, TaggerError>;
    /// Records ordered by id ascending, starting at `offset`, at most `limit` of them.
    /// The store may return fewer rows than asked for even when more remain.
    fn fetch_news(&self, offset: usize, limit: usize) -> Result<NewsPage, TaggerError>;
    /// Overwrite the `companies` column of one record.
    fn update_companies(&self, id: &RecordId, companies: &[CompanyName]) -> Result<(), TaggerError>;
}

/// Store kept in process memory, with switches to inject failures.
pub struct InMemoryNewsStore {
    companies: Vec<CompanyRow>,
    news: Mutex<BTreeMap<RecordId, NewsRecord>>,
    fail_companies: AtomicBool,
    fail_count: AtomicBool,
    failing_offsets: Mutex<FxHashSet<usize>>,
    failing_writes: Mutex<FxHashSet<RecordId>>,
    write_attempts: Mutex<Vec<RecordId>>,
    write_delay: Mutex<Option<Duration>>,
    page_cap: AtomicUsize,
    writes_in_flight: AtomicUsize,
    max_writes_in_flight: AtomicUsize,
}

impl InMemoryNewsStore {
    pub fn new(companies: Vec<CompanyRow>, news: Vec<NewsRecord>) -> Self {
        Self {
            companies,
            news: Mutex::new(news.into_iter().map(|r| (r.id.clone(), r)).collect()),
            fail_companies: AtomicBool::new(false),
            fail_count: AtomicBool::new(false),
            failing_offsets: Mutex::new(FxHashSet::default()),
            failing_writes: Mutex::new(FxHashSet::default()),
            write_attempts: Mutex::new(Vec::new()),
            write_delay: Mutex::new(None),
            page_cap: AtomicUsize::new(usize::MAX),
            writes_in_flight: AtomicUsize::new(0),
            max_writes_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn fail_company_load(&self) {
        self.fail_companies.store(true, Ordering::SeqCst);
    }

    pub fn fail_count(&self) {
        self.fail_count.store(true, Ordering::SeqCst);
    }

    pub fn fail_fetch_at(&self, offset: usize) {
        self.failing_offsets.lock().unwrap().insert(offset);
    }

    pub fn fail_write_for(&self, id: impl Into<RecordId>) {
        self.failing_writes.lock().unwrap().insert(id.into());
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    /// Return at most `rows` per fetch, like a server with a max-rows setting.
    pub fn cap_page_size(&self, rows: usize) {
        self.page_cap.store(rows.max(1), Ordering::SeqCst);
    }

    pub fn record(&self, id: &RecordId) -> Option<NewsRecord> {
        self.news.lock().unwrap().get(id).cloned()
    }

    pub fn records(&self) -> Vec<NewsRecord> {
        self.news.lock().unwrap().values().cloned().collect()
    }

    pub fn write_attempts(&self) -> Vec<RecordId> {
        self.write_attempts.lock().unwrap().clone()
    }

    pub fn max_writes_in_flight(&self) -> usize {
        self.max_writes_in_flight.load(Ordering::SeqCst)
    }
}

impl NewsStoreLike for InMemoryNewsStore {
    fn load_companies(&self) -> Result<Vec<CompanyRow>, TaggerError> {
        if self.fail_companies.load(Ordering::SeqCst) {
            return Err(TaggerError::StoreUnreachable("companies table unavailable".to_string()));
        }
        Ok(self.companies.clone())
    }

    fn count_news(&self) -> Result<usize, TaggerError> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(TaggerError::Count("count unavailable".to_string()));
        }
        Ok(self.news.lock().unwrap().len())
    }

    fn fetch_news(&self, offset: usize, limit: usize) -> Result<NewsPage, TaggerError> {
        if self.failing_offsets.lock().unwrap().contains(&offset) {
            return Err(TaggerError::Fetch {
                offset,
                message: "injected fetch failure".to_string(),
            });
        }
        let limit = limit.min(self.page_cap.load(Ordering::SeqCst));
        let news = self.news.lock().unwrap();
        let records = news
            .values()
            .skip(offset)
            .take(limit)
            .map(|r| NewsRecord {
                id: r.id.clone(),
                content: r.content.clone(),
                companies: Vec::new(),
            })
            .collect();
        Ok(NewsPage::from_records(records))
    }

    fn update_companies(&self, id: &RecordId, companies: &[CompanyName]) -> Result<(), TaggerError> {
        let in_flight = self.writes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_writes_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.write_attempts.lock().unwrap().push(id.clone());

        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let result = if self.failing_writes.lock().unwrap().contains(id) {
            Err(TaggerError::Write {
                id: id.to_string(),
                message: "injected write failure".to_string(),
            })
        } else {
            match self.news.lock().unwrap().get_mut(id) {
                Some(record) => {
                    record.companies = companies.to_vec();
                    Ok(())
                }
                None => Err(TaggerError::Write {
                    id: id.to_string(),
                    message: "no such record".to_string(),
                }),
            }
        };

        self.writes_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
