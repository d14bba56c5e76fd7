use crate::TaggerError;
use chrono::{Local, NaiveDateTime};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// `company_matching_YYYYMMDD_HHMMSS.log`, local time.
pub fn log_file_name(at: NaiveDateTime) -> String {
    format!("company_matching_{}.log", at.format("%Y%m%d_%H%M%S"))
}

pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(log_file_name(Local::now().naive_local()))
}

pub fn open_log_file(dir: &Path) -> Result<(PathBuf, File), TaggerError> {
    fs::create_dir_all(dir)?;
    let path = log_file_path(dir);
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Log to stdout and to a fresh file in `log_dir`. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(log_dir: &Path) -> Result<PathBuf, TaggerError> {
    let (path, file) = open_log_file(log_dir)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| TaggerError::Config(format!("tracing already initialized: {}", e)))?;

    Ok(path)
}
