// src/main.rs
mod browser;
mod config;
mod gamelogs;
mod storage;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use browser::http::HttpDriverFactory;
use config::{ScrapeConfig, DEFAULT_SEASON, DIRECTORY_URL};
use storage::DatasetStore;
use utils::AppError;

/// Incremental NBA player game-log scraper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the dataset and run summary
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// Season to scrape, e.g. 2025-2026
    #[arg(short, long, default_value = DEFAULT_SEASON)]
    season: String,

    /// Player directory page
    #[arg(long, default_value = DIRECTORY_URL)]
    directory_url: String,

    /// Directory for scrape_log.txt (defaults to the output directory)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Pause between players in milliseconds
    #[arg(long, default_value = "1000")]
    entity_delay_ms: u64,

    /// Only process the first N players (smoke runs)
    #[arg(long)]
    max_entities: Option<usize>,

    /// Skip players whose last stored game is older than this many days
    #[arg(long)]
    inactive_after_days: Option<i64>,

    /// Error rate (0.0-1.0) at or above which the run exits non-zero
    #[arg(long, default_value = "0.10")]
    error_rate_threshold: f64,

    /// Ignore stored dates and refetch every player
    #[arg(short, long)]
    force: bool,
}

impl Args {
    fn into_config(self) -> Result<ScrapeConfig, AppError> {
        if !(0.0..=1.0).contains(&self.error_rate_threshold) {
            return Err(AppError::Config(format!(
                "--error-rate-threshold must be between 0 and 1, got {}",
                self.error_rate_threshold
            )));
        }
        if self.season.trim().is_empty() {
            return Err(AppError::Config("--season must not be empty".to_string()));
        }

        Ok(ScrapeConfig {
            directory_url: self.directory_url,
            season: self.season,
            entity_delay: Duration::from_millis(self.entity_delay_ms),
            max_entities: self.max_entities,
            inactive_after_days: self.inactive_after_days,
            error_rate_threshold: self.error_rate_threshold,
            force_full: self.force,
            output_dir: self.output_dir,
            ..ScrapeConfig::default()
        })
    }
}

async fn run(args: Args) -> Result<bool, AppError> {
    let config = args.into_config()?;
    tracing::info!("Scraping season {} from {}", config.season, config.directory_url);

    // 3. Initialize storage
    let store = DatasetStore::new(&config.output_dir)?;

    // 4. Run the incremental pass
    let factory = HttpDriverFactory::new(config.clone());
    let today = chrono::Local::now().date_naive();
    let report = gamelogs::run_incremental(&factory, &store, &config, today).await?;

    // 5. Record what happened
    match store.save_summary(&report) {
        Ok(path) => tracing::info!("Run summary written to {}", path.display()),
        Err(e) => tracing::warn!("Failed to save run summary: {}", e),
    }
    match &report.dataset_path {
        Some(path) => tracing::info!("Dataset: {} ({} games, {} new)", path.display(), report.dataset_records, report.added),
        None => tracing::info!("Dataset unchanged ({} games)", report.dataset_records),
    }

    Ok(report.healthy)
}

#[tokio::main]
async fn main() -> ExitCode {
    let started = Instant::now();

    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    let log_dir = args.log_dir.clone().unwrap_or_else(|| args.output_dir.clone());
    let _guard = match utils::logging::setup_logging(&log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Starting run with args: {:?}", args);

    let outcome = run(args).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(true) => {
            tracing::info!("Run finished in {:.1}s", elapsed.as_secs_f64());
            ExitCode::SUCCESS
        }
        Ok(false) => {
            tracing::warn!("Run finished unhealthy in {:.1}s", elapsed.as_secs_f64());
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("Run failed after {:.1}s: {}", elapsed.as_secs_f64(), e);
            ExitCode::FAILURE
        }
    }
}
