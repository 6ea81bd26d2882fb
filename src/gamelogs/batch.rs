// src/gamelogs/batch.rs
use chrono::NaiveDate;

use crate::browser::{DriverFactory, PageDriver};
use crate::config::ScrapeConfig;
use crate::gamelogs::detail::GameLogFetcher;
use crate::gamelogs::models::{EntityRef, GameRecord, RunStats};
use crate::gamelogs::staleness::{should_fetch, LastDateIndex};
use crate::utils::error::FetchError;
use crate::utils::retry::Backoff;

/// Everything a batch produced, including partial results from an aborted run.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub records: Vec<GameRecord>,
    pub stats: RunStats,
    /// Why the entity loop ended early, if it did.
    pub aborted: Option<String>,
}

/// Walks the player list one at a time and collects games newer than the
/// stored ones. Owns the page driver for the duration of the run and swaps it
/// for a fresh one after a streak of connectivity failures.
pub struct BatchRunner<'a, F: DriverFactory> {
    factory: &'a F,
    config: &'a ScrapeConfig,
}

impl<'a, F: DriverFactory> BatchRunner<'a, F> {
    pub fn new(factory: &'a F, config: &'a ScrapeConfig) -> Self {
        Self { factory, config }
    }

    pub async fn run(
        &self,
        mut driver: Box<dyn PageDriver>,
        entities: &[EntityRef],
        index: &LastDateIndex,
        today: NaiveDate,
    ) -> BatchResult {
        let fetcher = GameLogFetcher::new(self.config);
        let mut result = BatchResult::default();
        result.stats.total_entities = entities.len();
        let mut consecutive_errors: u32 = 0;
        let total = entities.len();

        for (position, entity) in entities.iter().enumerate() {
            let verdict = should_fetch(&entity.name, index, today, self.config.inactive_after_days);
            if !verdict.should_fetch() {
                result.stats.skipped += 1;
                if result.stats.skipped % self.config.skip_log_every.max(1) == 0 {
                    tracing::info!(
                        "[{}/{}] Skipped {} players so far (latest: {}, {})",
                        position + 1,
                        total,
                        result.stats.skipped,
                        entity.name,
                        verdict
                    );
                }
                continue;
            }

            tracing::info!("[{}/{}] Fetching {} ({})", position + 1, total, entity.name, verdict);
            result.stats.fetched += 1;

            match self.fetch_with_retry(&fetcher, driver.as_mut(), entity, index).await {
                Ok(records) => {
                    consecutive_errors = 0;
                    if !records.is_empty() {
                        tracing::info!("  + {} new games", records.len());
                    }
                    result.stats.new_records += records.len();
                    result.records.extend(records);
                }
                Err(e) => {
                    let kind = e.kind();
                    result.stats.record_failure(kind);
                    tracing::warn!("  x Failed {} [{}]: {}", entity.name, kind, e.excerpt());
                    if e.is_connectivity() {
                        consecutive_errors += 1;
                    }
                }
            }

            if consecutive_errors >= self.config.restart_threshold {
                tracing::warn!("{} consecutive connectivity failures; restarting page driver", consecutive_errors);
                match self.restart(driver).await {
                    Ok(fresh) => {
                        driver = fresh;
                        result.stats.restarts += 1;
                        consecutive_errors = 0;
                    }
                    Err(e) => {
                        tracing::error!("Could not restart page driver: {}; keeping {} games collected so far", e, result.records.len());
                        result.aborted = Some(format!("page driver unavailable: {}", e.excerpt()));
                        return result;
                    }
                }
            }

            tokio::time::sleep(self.config.entity_delay).await;
        }

        if let Err(e) = driver.close().await {
            tracing::debug!("Closing page driver failed: {}", e);
        }
        result
    }

    /// Bounded retry around one player's fetch with linearly growing pauses.
    async fn fetch_with_retry(
        &self,
        fetcher: &GameLogFetcher<'_>,
        driver: &mut dyn PageDriver,
        entity: &EntityRef,
        index: &LastDateIndex,
    ) -> Result<Vec<GameRecord>, FetchError> {
        let mut backoff = Backoff::new(self.config.detail_retry);
        loop {
            match fetcher.try_fetch_new_games(driver, entity, index).await {
                Ok(records) => return Ok(records),
                Err(e) => match backoff.next_delay() {
                    Some(pause) => {
                        tracing::info!("  retry {} for {} after: {}", backoff.attempt() - 1, entity.name, e.excerpt());
                        tokio::time::sleep(pause).await;
                    }
                    None => return Err(e),
                },
            }
        }
    }

    /// Drops the current driver, pauses, and launches a replacement.
    async fn restart(&self, mut driver: Box<dyn PageDriver>) -> Result<Box<dyn PageDriver>, FetchError> {
        if let Err(e) = driver.close().await {
            tracing::debug!("Closing stale page driver failed: {}", e);
        }
        drop(driver);
        tokio::time::sleep(self.config.restart_pause).await;

        let mut backoff = Backoff::new(self.config.relaunch_retry);
        loop {
            match self.factory.launch().await {
                Ok(fresh) => {
                    tracing::info!("Page driver restarted");
                    return Ok(fresh);
                }
                Err(e) => match backoff.next_delay() {
                    Some(pause) => {
                        tracing::warn!("Driver launch failed ({}); retrying in {:?}", e.excerpt(), pause);
                        tokio::time::sleep(pause).await;
                    }
                    None => return Err(e),
                },
            }
        }
    }
}
