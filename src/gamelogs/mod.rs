// src/gamelogs/mod.rs
pub mod batch;
pub mod detail;
pub mod directory;
pub mod models;
pub mod staleness;

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::browser::{DriverFactory, PageDriver};
use crate::config::ScrapeConfig;
use crate::storage::reconcile::reconcile;
use crate::storage::{last_date_index, DatasetStore};
use crate::utils::AppError;
use batch::BatchRunner;
use directory::DirectoryFetcher;
use models::RunStats;
use staleness::LastDateIndex;

/// What a run did; logged, written as `run_summary.json`, and mapped to the
/// process exit code.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: String,
    pub season: String,
    pub stats: RunStats,
    pub dataset_records: usize,
    pub added: usize,
    pub dataset_path: Option<PathBuf>,
    pub aborted: Option<String>,
    pub healthy: bool,
}

async fn close_quietly(driver: &mut dyn PageDriver) {
    if let Err(e) = driver.close().await {
        tracing::debug!("Closing page driver failed: {}", e);
    }
}

/// One incremental pass: load what is stored, list players, fetch what is
/// stale, merge and persist.
pub async fn run_incremental<F: DriverFactory>(
    factory: &F,
    store: &DatasetStore,
    config: &ScrapeConfig,
    today: NaiveDate,
) -> Result<RunReport, AppError> {
    let started_at = chrono::Utc::now().to_rfc3339();

    // 1. Existing dataset and per-player boundaries
    let existing = store.load();
    let index = if config.force_full {
        tracing::info!("Full refresh requested; ignoring stored dates");
        LastDateIndex::new()
    } else {
        last_date_index(&existing)
    };
    tracing::info!("{} players already have stored games", index.len());

    // 2. Page driver and player directory
    let mut driver = factory.launch().await?;
    let mut entities = match DirectoryFetcher::new(config).fetch_entities(driver.as_mut()).await {
        Ok(entities) => entities,
        Err(e) => {
            close_quietly(driver.as_mut()).await;
            return Err(e.into());
        }
    };

    if entities.is_empty() {
        tracing::error!("Player directory listed no players");
        close_quietly(driver.as_mut()).await;
        return Ok(RunReport {
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            season: config.season.clone(),
            stats: RunStats::default(),
            dataset_records: existing.len(),
            added: 0,
            dataset_path: None,
            aborted: Some("player directory was empty".to_string()),
            healthy: false,
        });
    }
    if let Some(limit) = config.max_entities {
        if entities.len() > limit {
            tracing::info!("Limiting run to the first {} of {} players", limit, entities.len());
            entities.truncate(limit);
        }
    }

    // 3. Fetch new games
    let batch = BatchRunner::new(factory, config).run(driver, &entities, &index, today).await;
    if let Some(reason) = &batch.aborted {
        tracing::warn!("Run stopped early: {}", reason);
    }

    // 4. Merge and persist
    let outcome = reconcile(store, existing, batch.records)?;

    let stats = batch.stats;
    stats.log_summary();
    let healthy = stats.error_rate() < config.error_rate_threshold;
    if !healthy {
        tracing::warn!(
            "Error rate {:.1}% is above {:.1}%; the site layout may have changed",
            stats.error_rate() * 100.0,
            config.error_rate_threshold * 100.0
        );
    }

    Ok(RunReport {
        started_at,
        finished_at: chrono::Utc::now().to_rfc3339(),
        season: config.season.clone(),
        stats,
        dataset_records: outcome.records.len(),
        added: outcome.added,
        dataset_path: outcome.written,
        aborted: batch.aborted,
        healthy,
    })
}
