use crate::matcher::DEFAULT_MIN_OCCURRENCES;
use crate::TaggerError;
use std::path::PathBuf;
use std::time::Duration;

pub const STORE_URL_VAR: &str = "SUPABASE_URL";
pub const STORE_KEY_VAR: &str = "SUPABASE_KEY";

pub const DEFAULT_BATCH_SIZE: usize = 1000;
// sized for the rate limit of a free-tier store
pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_NEWS_TABLE: &str = "news_items";
pub const DEFAULT_COMPANIES_TABLE: &str = "companies";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Settings for one tagging run.
#[derive(Debug, Clone)]
pub struct TaggerConfig {
    pub store_url: String,
    pub store_key: String,
    pub news_table: String,
    pub companies_table: String,
    pub batch_size: usize,
    pub workers: usize,
    pub min_occurrences: usize,
    pub http_timeout: Duration,
    pub log_dir: PathBuf,
    /// Stop between batches once this much time has passed.
    pub max_runtime: Option<Duration>,
}

impl TaggerConfig {
    /// Defaults for everything except the store coordinates.
    pub fn for_store(store_url: &str, store_key: &str) -> Self {
        Self {
            store_url: store_url.to_string(),
            store_key: store_key.to_string(),
            news_table: DEFAULT_NEWS_TABLE.to_string(),
            companies_table: DEFAULT_COMPANIES_TABLE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            max_runtime: None,
        }
    }

    /// Build from the process environment.
    pub fn from_env() -> Result<Self, TaggerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup, so callers can supply their own source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TaggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| TaggerError::Config(format!("{} is not set", name)))
        };
        let config = Self::for_store(&required(STORE_URL_VAR)?, &required(STORE_KEY_VAR)?);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TaggerError> {
        if self.store_url.trim().is_empty() {
            return Err(TaggerError::Config("store url is empty".to_string()));
        }
        if !self.store_url.starts_with("http://") && !self.store_url.starts_with("https://") {
            return Err(TaggerError::Config(format!(
                "store url must be http(s): {}",
                self.store_url
            )));
        }
        if self.store_key.trim().is_empty() {
            return Err(TaggerError::Config("store key is empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(TaggerError::Config("batch size must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(TaggerError::Config("worker count must be positive".to_string()));
        }
        if self.min_occurrences == 0 {
            return Err(TaggerError::Config("occurrence threshold must be positive".to_string()));
        }
        Ok(())
    }
}
