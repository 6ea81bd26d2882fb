// src/utils/logging.rs
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::utils::error::AppError;

/// Keeps the background log writer alive; dropping it flushes the file.
#[allow(dead_code)]
pub struct LogGuard(WorkerGuard);

/// Reads log level filters from the `RUST_LOG` environment variable.
/// Defaults to "info" if `RUST_LOG` is not set.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Sets up console logging plus a persistent `scrape_log.txt` in `log_dir`.
/// The file is appended to across runs.
pub fn setup_logging(log_dir: &Path) -> Result<LogGuard, AppError> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("scrape_log")
        .filename_suffix("txt")
        .build(log_dir)
        .map_err(|e| AppError::Config(format!("Cannot open log file in {}: {}", log_dir.display(), e)))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(env_filter());
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Logging already initialized: {}", e)))?;

    tracing::debug!("Logging setup complete.");
    Ok(LogGuard(guard))
}
