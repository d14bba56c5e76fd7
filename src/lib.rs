pub mod batch_fetcher;
pub mod config;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod postgrest;
pub mod record;
pub mod reference;
pub mod run_stats;
pub mod store;
pub mod worker_pool;
pub mod writer;

pub use config::TaggerConfig;
pub use error::*;
pub use matcher::{match_companies, DEFAULT_MIN_OCCURRENCES};
pub use pipeline::{run, CancelToken, RunOptions};
pub use record::{Batch, CompanyName, CompanyRow, MatchResult, NewsPage, NewsRecord, NewsRow, RecordId};
pub use reference::ReferenceSet;
pub use run_stats::RunStats;
pub use store::{InMemoryNewsStore, NewsStoreLike};
