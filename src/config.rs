// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::browser::FilterLayout;
use crate::utils::retry::RetryPolicy;

pub const DIRECTORY_URL: &str = "https://basketball.realgm.com/nba/players";
pub const DEFAULT_SEASON: &str = "2025-2026";
pub const DATASET_FILE: &str = "nba_player_game_logs.csv";
pub const SUMMARY_FILE: &str = "run_summary.json";

// Looks like a desktop Chrome; the site serves a reduced page to unknown agents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything one scraping run needs, resolved once in `main` and passed down.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    // --- Source ---
    pub directory_url: String,
    /// Path segment swapped to turn a directory link into its game-log page.
    pub summary_segment: String,
    pub game_log_segment: String,
    pub user_agent: String,

    // --- Filters ---
    pub season: String,
    pub league_labels: Vec<String>,
    pub category_labels: Vec<String>,
    /// Option picked when none of the acceptable labels exist.
    pub filter_fallback_index: usize,
    pub filter_layout: FilterLayout,

    // --- Timing ---
    pub page_timeout: Duration,
    pub poll_interval: Duration,
    /// How long a filter change may take to detach the old results table.
    pub reload_timeout: Duration,
    pub request_delay: Duration,
    pub entity_delay: Duration,
    pub restart_pause: Duration,

    // --- Retry & health ---
    pub directory_retry: RetryPolicy,
    pub detail_retry: RetryPolicy,
    pub relaunch_retry: RetryPolicy,
    pub restart_threshold: u32,
    pub skip_log_every: usize,
    pub error_rate_threshold: f64,
    pub inactive_after_days: Option<i64>,
    pub max_entities: Option<usize>,
    pub force_full: bool,

    // --- Output ---
    pub output_dir: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            directory_url: DIRECTORY_URL.to_string(),
            summary_segment: "/Summary/".to_string(),
            game_log_segment: "/GameLogs/".to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),

            season: DEFAULT_SEASON.to_string(),
            league_labels: vec!["NBA".to_string()],
            category_labels: vec!["All Games".to_string(), "Regular Season".to_string()],
            filter_fallback_index: 0,
            filter_layout: FilterLayout::default(),

            page_timeout: Duration::from_secs(45),
            poll_interval: Duration::from_millis(250),
            reload_timeout: Duration::from_secs(10),
            request_delay: Duration::from_millis(150),
            entity_delay: Duration::from_secs(1),
            restart_pause: Duration::from_secs(10),

            directory_retry: RetryPolicy::linear(3, Duration::from_secs(5)),
            detail_retry: RetryPolicy::linear(3, Duration::from_secs(1)),
            relaunch_retry: RetryPolicy::linear(2, Duration::from_secs(10)),
            restart_threshold: 5,
            skip_log_every: 50,
            error_rate_threshold: 0.10,
            inactive_after_days: None,
            max_entities: None,
            force_full: false,

            output_dir: PathBuf::from("./output"),
        }
    }
}

impl ScrapeConfig {
    /// Acceptable season labels, long form first: "2025-2026" then "2025-26".
    pub fn season_labels(&self) -> Vec<String> {
        let short = self.season.replacen("-20", "-", 1);
        if short == self.season {
            vec![self.season.clone()]
        } else {
            vec![self.season.clone(), short]
        }
    }

    /// No pauses and short waits, for driving scripted pages in tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            page_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            reload_timeout: Duration::ZERO,
            request_delay: Duration::ZERO,
            entity_delay: Duration::ZERO,
            restart_pause: Duration::ZERO,
            directory_retry: RetryPolicy::linear(3, Duration::ZERO),
            detail_retry: RetryPolicy::linear(3, Duration::ZERO),
            relaunch_retry: RetryPolicy::linear(2, Duration::ZERO),
            ..Self::default()
        }
    }
}
