use clap::Parser;
use company_tagger::config::DEFAULT_LOG_DIR;
use company_tagger::logging::init_tracing;
use company_tagger::postgrest::PostgrestNewsStore;
use company_tagger::{run, RunOptions, RunStats, TaggerConfig, TaggerError};
use dotenv::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Store coordinates come from SUPABASE_URL and SUPABASE_KEY; flags override the rest.
#[derive(Parser)]
#[command(name = "company_tagger")]
#[command(about = "Tag every news record with the companies it mentions", long_about = None)]
struct Cli {
    /// Records per fetched page
    #[arg(long)]
    batch_size: Option<usize>,
    /// Concurrent workers (keep low for rate-limited stores)
    #[arg(long)]
    workers: Option<usize>,
    /// Mentions needed before a company is tagged
    #[arg(long)]
    min_occurrences: Option<usize>,
    #[arg(long)]
    news_table: Option<String>,
    #[arg(long)]
    companies_table: Option<String>,
    /// Directory for the run log file
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,
    /// Stop between batches after this many seconds
    #[arg(long)]
    max_runtime_secs: Option<u64>,
    #[arg(long)]
    http_timeout_secs: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut TaggerConfig) {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(min_occurrences) = self.min_occurrences {
            config.min_occurrences = min_occurrences;
        }
        if let Some(table) = &self.news_table {
            config.news_table = table.clone();
        }
        if let Some(table) = &self.companies_table {
            config.companies_table = table.clone();
        }
        if let Some(secs) = self.http_timeout_secs {
            config.http_timeout = Duration::from_secs(secs);
        }
        config.max_runtime = self.max_runtime_secs.map(Duration::from_secs);
        config.log_dir = self.log_dir.clone();
    }
}

fn try_main(cli: &Cli) -> Result<RunStats, TaggerError> {
    let mut config = TaggerConfig::from_env()?;
    cli.apply(&mut config);
    config.validate()?;

    let store = PostgrestNewsStore::new(&config)?;
    run(Arc::new(store), &RunOptions::from_config(&config))
}

fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    match init_tracing(&cli.log_dir) {
        Ok(path) => info!("Writing run log to {}", path.display()),
        Err(e) => {
            eprintln!("[company_tagger] Failed to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if exits_with_failure(&try_main(&cli)) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Only fatal errors fail the process. Per-batch and per-record errors are
/// already counted in the run stats.
fn exits_with_failure(result: &Result<RunStats, TaggerError>) -> bool {
    match result {
        Ok(_) => {
            info!("Company matching run completed");
            false
        }
        Err(e) if e.is_fatal() => {
            error!("Company matching run failed: {}", e);
            true
        }
        Err(e) => {
            warn!("Company matching run finished with a non-fatal error: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_follows_error_severity() {
        assert!(!exits_with_failure(&Ok(RunStats::new())));
        assert!(exits_with_failure(&Err(TaggerError::ReferenceLoad("down".to_string()))));
        assert!(exits_with_failure(&Err(TaggerError::StoreUnreachable("all failed".to_string()))));
        assert!(exits_with_failure(&Err(TaggerError::Count("timeout".to_string()))));
        assert!(!exits_with_failure(&Err(TaggerError::Fetch {
            offset: 0,
            message: "reset".to_string(),
        })));
        assert!(!exits_with_failure(&Err(TaggerError::Write {
            id: "3".to_string(),
            message: "429".to_string(),
        })));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["company_tagger", "--batch-size", "50", "--workers", "2"]);
        let mut config = TaggerConfig::for_store("https://db.example.co", "k");
        cli.apply(&mut config);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.workers, 2);
        assert_eq!(config.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
    }
}
