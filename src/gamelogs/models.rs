// src/gamelogs/models.rs
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::utils::error::FailureKind;

/// Output header, in file order.
pub const COLUMNS: [&str; 28] = [
    "Player", "Season", "Date", "Team", "Opponent", "W/L", "Status", "Pos",
    "MIN", "PTS", "FGM", "FGA", "FG%", "3PM", "3PA", "3P%", "FTM", "FTA", "FT%",
    "ORB", "DRB", "REB", "AST", "STL", "BLK", "TOV", "PF", "FIC",
];

/// Columns read from the game-log table before the box score starts.
const LEADING_CELLS: usize = 6;
pub const STAT_COUNT: usize = COLUMNS.len() - 2 - LEADING_CELLS;

/// Rows with fewer cells than this are not game lines.
pub const MIN_ROW_CELLS: usize = 3;

// Formats seen on game-log and player pages, most common first.
const DATE_FORMATS: [&str; 6] = ["%b %d, %Y", "%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%a %b %d, %Y", "%a, %b %d, %Y"];

pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// One player's line for one game. Box-score values stay as page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub player: String,
    pub season: String,
    pub date: String,
    pub team: String,
    pub opponent: String,
    pub outcome: String,
    pub status: String,
    pub position: String,
    pub stats: Vec<String>,
}

/// Deduplication identity: (player, date, team, opponent).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub player: String,
    pub date: String,
    pub team: String,
    pub opponent: String,
}

impl GameRecord {
    /// Builds a record from table cells (Date, Team, Opp, W/L, Status, Pos,
    /// then the box score). Short rows are padded, long rows truncated.
    pub fn from_cells(player: &str, season: &str, cells: Vec<String>) -> Option<GameRecord> {
        if cells.len() < MIN_ROW_CELLS {
            return None;
        }
        let mut cells = cells.into_iter();
        let mut next = || cells.next().unwrap_or_default();

        let date = next();
        let team = next();
        let opponent = next();
        let outcome = next();
        let status = next();
        let position = next();
        let stats = (0..STAT_COUNT).map(|_| next()).collect();

        Some(GameRecord {
            player: player.to_string(),
            season: season.to_string(),
            date,
            team,
            opponent,
            outcome,
            status,
            position,
            stats,
        })
    }

    /// Inverse of `to_row`; expects exactly `COLUMNS.len()` fields.
    pub fn from_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> Option<GameRecord> {
        let fields: Vec<String> = fields.into_iter().map(str::to_string).collect();
        if fields.len() != COLUMNS.len() {
            return None;
        }
        let mut fields = fields.into_iter();
        let player = fields.next()?;
        let season = fields.next()?;
        let cells: Vec<String> = fields.collect();
        GameRecord::from_cells(&player, &season, cells)
    }

    pub fn to_row(&self) -> Vec<&str> {
        let mut row = vec![
            self.player.as_str(),
            self.season.as_str(),
            self.date.as_str(),
            self.team.as_str(),
            self.opponent.as_str(),
            self.outcome.as_str(),
            self.status.as_str(),
            self.position.as_str(),
        ];
        row.extend(self.stats.iter().map(String::as_str));
        row
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_game_date(&self.date)
    }

    /// Dates compare by calendar day when parseable so "Oct 5, 2025" and
    /// "2025-10-05" are the same game.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            player: self.player.clone(),
            date: self
                .parsed_date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| self.date.trim().to_string()),
            team: self.team.clone(),
            opponent: self.opponent.clone(),
        }
    }
}

/// A player as listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub name: String,
    pub url: String,
}

impl EntityRef {
    pub fn game_log_url(&self, summary_segment: &str, game_log_segment: &str) -> String {
        self.url.replace(summary_segment, game_log_segment)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total_entities: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub new_records: usize,
    pub errors: usize,
    pub restarts: usize,
    pub failure_reasons: BTreeMap<FailureKind, usize>,
}

impl RunStats {
    pub fn record_failure(&mut self, kind: FailureKind) {
        self.errors += 1;
        *self.failure_reasons.entry(kind).or_insert(0) += 1;
    }

    /// Failed share of attempted fetches; zero when nothing was attempted.
    pub fn error_rate(&self) -> f64 {
        if self.fetched == 0 {
            0.0
        } else {
            self.errors as f64 / self.fetched as f64
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("{}", "=".repeat(60));
        tracing::info!("Run summary");
        tracing::info!("{}", "=".repeat(60));
        tracing::info!("Players listed:   {}", self.total_entities);
        tracing::info!("Fetched:          {}", self.fetched);
        tracing::info!("Skipped:          {}", self.skipped);
        tracing::info!("New game records: {}", self.new_records);
        tracing::info!("Errors:           {} ({:.1}%)", self.errors, self.error_rate() * 100.0);
        tracing::info!("Driver restarts:  {}", self.restarts);

        if !self.failure_reasons.is_empty() {
            tracing::info!("Failure reasons:");
            let mut reasons: Vec<_> = self.failure_reasons.iter().collect();
            reasons.sort_by(|a, b| b.1.cmp(a.1));
            for (kind, count) in reasons {
                let pct = *count as f64 / self.errors.max(1) as f64 * 100.0;
                tracing::info!("  - {}: {} ({:.1}%)", kind, count, pct);
            }
        }
    }
}
