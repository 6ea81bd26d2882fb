// src/gamelogs/detail.rs
use chrono::NaiveDate;

use crate::browser::{FilterHandle, FilterRole, Locator, Mark, PageDriver, PickEffect, SelectOption, Waiter};
use crate::config::ScrapeConfig;
use crate::gamelogs::models::{parse_game_date, EntityRef, GameRecord, MIN_ROW_CELLS};
use crate::gamelogs::staleness::LastDateIndex;
use crate::utils::error::{FailureKind, FetchError};

// --- Page Selectors ---
const RESULT_TABLE: &str = "table";
const RESULT_ROWS: &str = "table tbody tr";
const NAME_HEADING: &str = "div.half-column-left h2";

/// Row order observed so far, inferred from the first two dated rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Undetermined,
    Descending,
    Ascending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowVerdict {
    Keep,
    /// On or before the boundary; drop and keep scanning.
    Known,
    /// Known row in a table confirmed newest-first; nothing further is new.
    Stop,
}

/// Filters table rows against the last persisted game date.
///
/// Tables may list games oldest-first or newest-first, so the scan only
/// stops early once the first two dated rows show descending order.
/// A page that mixes orders after those two rows is not detected and could
/// lose rows after an early stop.
#[derive(Debug)]
pub struct BoundaryScan {
    last_date: Option<NaiveDate>,
    first_seen: Option<NaiveDate>,
    dated_rows: usize,
    direction: ScanDirection,
}

impl BoundaryScan {
    pub fn new(last_date: Option<NaiveDate>) -> Self {
        Self { last_date, first_seen: None, dated_rows: 0, direction: ScanDirection::Undetermined }
    }

    pub fn direction(&self) -> ScanDirection {
        self.direction
    }

    pub fn observe(&mut self, date: Option<NaiveDate>) -> RowVerdict {
        let Some(last) = self.last_date else {
            return RowVerdict::Keep;
        };
        // Undated rows cannot be compared; they go through.
        let Some(date) = date else {
            return RowVerdict::Keep;
        };

        match (self.dated_rows, self.first_seen) {
            (0, _) => self.first_seen = Some(date),
            (1, Some(first)) => {
                self.direction = match date.cmp(&first) {
                    std::cmp::Ordering::Less => ScanDirection::Descending,
                    std::cmp::Ordering::Greater => ScanDirection::Ascending,
                    std::cmp::Ordering::Equal => ScanDirection::Undetermined,
                };
            }
            _ => {}
        }
        self.dated_rows += 1;

        if date > last {
            RowVerdict::Keep
        } else if self.direction == ScanDirection::Descending {
            RowVerdict::Stop
        } else {
            RowVerdict::Known
        }
    }
}

/// First acceptable label present, else the fallback position if it exists.
pub fn pick_option(options: &[SelectOption], wanted: &[String], fallback: usize) -> Option<usize> {
    wanted
        .iter()
        .find_map(|label| options.iter().position(|o| o.label == *label))
        .or(if fallback < options.len() { Some(fallback) } else { None })
}

/// Fetches one player's game log and keeps only games newer than what is
/// already stored.
pub struct GameLogFetcher<'a> {
    config: &'a ScrapeConfig,
    waiter: Waiter,
    season_labels: Vec<String>,
}

impl<'a> GameLogFetcher<'a> {
    pub fn new(config: &'a ScrapeConfig) -> Self {
        Self {
            config,
            waiter: Waiter::new(config.page_timeout, config.poll_interval),
            season_labels: config.season_labels(),
        }
    }

    /// Infallible form: failures are logged and yield no games.
    #[cfg(test)]
    pub async fn fetch_new_games(
        &self,
        driver: &mut dyn PageDriver,
        entity: &EntityRef,
        index: &LastDateIndex,
    ) -> Vec<GameRecord> {
        match self.try_fetch_new_games(driver, entity, index).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not read game log for {}: {}", entity.name, e.excerpt());
                Vec::new()
            }
        }
    }

    /// The boundary is the stored date under the page's own name, falling
    /// back to the directory name when the page name has no history.
    pub async fn try_fetch_new_games(
        &self,
        driver: &mut dyn PageDriver,
        entity: &EntityRef,
        index: &LastDateIndex,
    ) -> Result<Vec<GameRecord>, FetchError> {
        let url = entity.game_log_url(&self.config.summary_segment, &self.config.game_log_segment);

        // 1. Navigate; a slow load is still worth reading if the page arrived.
        if let Err(e) = driver.goto(&url).await {
            let arrived = driver.current_url().await.as_deref() == Some(url.as_str());
            if e.kind() != FailureKind::Timeout || !arrived {
                return Err(e);
            }
            tracing::warn!("Navigation to {} timed out; reading the partial page", url);
        }
        self.waiter.for_count(driver, RESULT_TABLE, 1).await?;

        // 2. The page heading is the canonical name
        let name = self.resolve_name(driver, entity).await?;
        let last_date = index.get(&name).or_else(|| index.get(&entity.name)).copied();

        // 3. Drive the filters to league / season / category
        self.apply_filters(driver).await?;

        // 4-6. Read rows past the boundary
        let records = self.read_new_rows(driver, &name, last_date).await?;
        tracing::debug!("{}: {} new games (boundary {:?})", name, records.len(), last_date);
        Ok(records)
    }

    async fn resolve_name(&self, driver: &mut dyn PageDriver, entity: &EntityRef) -> Result<String, FetchError> {
        let heading = driver
            .query_all(NAME_HEADING)
            .await?
            .into_iter()
            .map(|h| h.own_text)
            .find(|text| !text.is_empty());

        match heading {
            Some(name) => {
                if name != entity.name {
                    tracing::debug!("Directory name '{}' is '{}' on the player page", entity.name, name);
                }
                Ok(name)
            }
            None => Ok(entity.name.clone()),
        }
    }

    async fn apply_filters(&self, driver: &mut dyn PageDriver) -> Result<(), FetchError> {
        let handles = self.config.filter_layout.locate(driver).await?;
        for handle in &handles {
            let wanted = match handle.role {
                FilterRole::League => &self.config.league_labels,
                FilterRole::Season => &self.season_labels,
                FilterRole::Category => &self.config.category_labels,
            };
            self.set_filter(driver, handle, wanted).await?;
        }
        Ok(())
    }

    async fn set_filter(
        &self,
        driver: &mut dyn PageDriver,
        handle: &FilterHandle,
        wanted: &[String],
    ) -> Result<(), FetchError> {
        let Some(options) = driver.select_options(&handle.locator).await? else {
            tracing::debug!("{} filter disappeared after reload", handle.role);
            return Ok(());
        };
        let Some(target) = pick_option(&options, wanted, self.config.filter_fallback_index) else {
            tracing::debug!("{} filter has no options", handle.role);
            return Ok(());
        };
        if options[target].selected {
            tracing::trace!("{} filter already at '{}'", handle.role, options[target].label);
            return Ok(());
        }

        tracing::debug!("Setting {} filter to '{}'", handle.role, options[target].label);
        let before = driver.mark(&Locator::first(RESULT_TABLE)).await?;
        let before = match driver.choose_option(&handle.locator, target).await? {
            PickEffect::Reloading => before,
            PickEffect::InPlace => None,
        };
        self.wait_for_refresh(driver, before).await
    }

    /// Old table detaches, then a body with at least one row shows up.
    async fn wait_for_refresh(&self, driver: &mut dyn PageDriver, before: Option<Mark>) -> Result<(), FetchError> {
        if let Some(mark) = before {
            let reload = Waiter::new(self.config.reload_timeout, self.config.poll_interval);
            if let Err(e) = reload.for_stale(driver, &mark).await {
                tracing::debug!("Results table did not reload: {}", e);
            }
        }
        self.waiter.for_count(driver, RESULT_ROWS, 1).await?;
        Ok(())
    }

    async fn read_new_rows(
        &self,
        driver: &mut dyn PageDriver,
        name: &str,
        last_date: Option<NaiveDate>,
    ) -> Result<Vec<GameRecord>, FetchError> {
        let mut scan = BoundaryScan::new(last_date);
        let mut records = Vec::new();
        let mut index = 0;

        loop {
            // Re-query per row; a late reload detaches rows read earlier.
            let row = Locator::nth(RESULT_ROWS, index);
            index += 1;
            let cells = match driver.query_within(&row, "td").await {
                Ok(Some(cells)) => cells,
                Ok(None) => break,
                Err(FetchError::StaleElement(e)) => {
                    tracing::debug!("Row {} went stale, skipping: {}", index - 1, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let cells: Vec<String> = cells.into_iter().map(|c| c.text).collect();
            if cells.len() < MIN_ROW_CELLS {
                continue;
            }

            match scan.observe(parse_game_date(&cells[0])) {
                RowVerdict::Keep => records.extend(GameRecord::from_cells(name, &self.config.season, cells)),
                RowVerdict::Known => {}
                RowVerdict::Stop => break,
            }
        }

        tracing::trace!("Scanned {} rows, order {:?}", index, scan.direction());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{ScriptedDriver, ScriptedSite};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn verdicts(last: Option<NaiveDate>, dates: &[Option<NaiveDate>]) -> Vec<RowVerdict> {
        let mut scan = BoundaryScan::new(last);
        let mut out = Vec::new();
        for date in dates {
            let verdict = scan.observe(*date);
            out.push(verdict);
            if verdict == RowVerdict::Stop {
                break;
            }
        }
        out
    }

    #[test]
    fn descending_rows_stop_at_boundary() {
        let rows = [Some(day(9)), Some(day(7)), Some(day(5)), Some(day(3))];
        let got = verdicts(Some(day(5)), &rows);
        assert_eq!(got, vec![RowVerdict::Keep, RowVerdict::Keep, RowVerdict::Stop]);
    }

    #[test]
    fn ascending_rows_are_filtered_without_stopping() {
        let rows = [Some(day(3)), Some(day(5)), Some(day(7)), Some(day(9))];
        let got = verdicts(Some(day(5)), &rows);
        assert_eq!(got, vec![RowVerdict::Known, RowVerdict::Known, RowVerdict::Keep, RowVerdict::Keep]);
    }

    #[test]
    fn known_first_row_does_not_stop_before_direction_is_known() {
        // Newest-first table where everything is already stored
        let rows = [Some(day(5)), Some(day(3)), Some(day(1))];
        let got = verdicts(Some(day(5)), &rows);
        assert_eq!(got, vec![RowVerdict::Known, RowVerdict::Stop]);
    }

    #[test]
    fn equal_leading_dates_leave_direction_undetermined() {
        let mut scan = BoundaryScan::new(Some(day(5)));
        assert_eq!(scan.observe(Some(day(4))), RowVerdict::Known);
        assert_eq!(scan.observe(Some(day(4))), RowVerdict::Known);
        assert_eq!(scan.direction(), ScanDirection::Undetermined);
        assert_eq!(scan.observe(Some(day(2))), RowVerdict::Known);
        assert_eq!(scan.observe(Some(day(8))), RowVerdict::Keep);
    }

    #[test]
    fn undated_rows_and_missing_boundary_keep_everything() {
        assert_eq!(verdicts(None, &[Some(day(1)), Some(day(2))]), vec![RowVerdict::Keep, RowVerdict::Keep]);
        let mut scan = BoundaryScan::new(Some(day(5)));
        assert_eq!(scan.observe(None), RowVerdict::Keep);
        assert_eq!(scan.direction(), ScanDirection::Undetermined);
    }

    #[test]
    fn pick_option_prefers_labels_in_order() {
        let options: Vec<SelectOption> = ["2024-25", "2025-26", "2025-2026"]
            .iter()
            .map(|l| SelectOption { label: l.to_string(), value: None, selected: false })
            .collect();
        let wanted = vec!["2025-2026".to_string(), "2025-26".to_string()];
        assert_eq!(pick_option(&options, &wanted, 0), Some(2));
        assert_eq!(pick_option(&options, &["1999-00".to_string()], 0), Some(0));
        assert_eq!(pick_option(&options, &["1999-00".to_string()], 7), None);
        assert_eq!(pick_option(&[], &wanted, 0), None);
    }

    // --- Scripted game-log pages ---

    const SUMMARY: &str = "https://basketball.realgm.com/player/A-Player/Summary/1";
    const LOG_2024: &str = "https://basketball.realgm.com/player/A-Player/GameLogs/1";
    const LOG_2025: &str = "https://basketball.realgm.com/player/A-Player/GameLogs/1/NBA/2025/All";

    fn log_page(current_season: bool, dates: &[&str]) -> String {
        let (sel25, sel24) = if current_season { ("selected", "") } else { ("", "selected") };
        let rows: String = dates
            .iter()
            .map(|d| format!(
                "<tr><td>{}</td><td>LAL</td><td>GSW</td><td>W</td><td>Starter</td><td>G</td><td>30:00</td><td>21</td></tr>",
                d
            ))
            .collect();
        format!(
            r#"<html><body>
            <div class="half-column-left"><h2>A. Player <span>#7</span></h2></div>
            <select><option value="/player/A-Player/GameLogs/1/NBA/2025/All" selected>NBA</option></select>
            <select>
                <option value="/player/A-Player/GameLogs/1/NBA/2024/All" {sel24}>2024-25</option>
                <option value="/player/A-Player/GameLogs/1/NBA/2025/All" {sel25}>2025-26</option>
            </select>
            <select><option value="/player/A-Player/GameLogs/1/NBA/2025/All" selected>All Games</option></select>
            <table><thead><tr><th>Date</th></tr></thead><tbody>
                {rows}
                <tr><td colspan="2">Totals</td></tr>
            </tbody></table>
            </body></html>"#
        )
    }

    // Directory spells the name without the period the page heading uses.
    fn entity() -> EntityRef {
        EntityRef { name: "A Player".into(), url: SUMMARY.into() }
    }

    fn stored(name: &str, last: NaiveDate) -> LastDateIndex {
        LastDateIndex::from([(name.to_string(), last)])
    }

    #[tokio::test]
    async fn switches_season_and_reads_new_rows() {
        let config = ScrapeConfig::for_tests();
        let site = ScriptedSite::new()
            .page(LOG_2024, &log_page(false, &["Apr 10, 2025"]))
            .page(LOG_2025, &log_page(true, &["Nov 9, 2025", "Nov 7, 2025", "Nov 5, 2025", "Nov 3, 2025"]))
            .shared();
        let mut driver = ScriptedDriver::new(site.clone());

        let records = GameLogFetcher::new(&config)
            .try_fetch_new_games(&mut driver, &entity(), &stored("A Player", day(5)))
            .await
            .unwrap();

        let dates: Vec<_> = records.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["Nov 9, 2025", "Nov 7, 2025"]);
        assert!(records.iter().all(|r| r.player == "A. Player" && r.season == "2025-2026"));
        assert_eq!(records[0].stats[1], "21");
        assert_eq!(site.visits(LOG_2025), 1);
    }

    #[tokio::test]
    async fn controls_already_set_are_left_alone() {
        let config = ScrapeConfig::for_tests();
        let site = ScriptedSite::new()
            .page(LOG_2024, &log_page(true, &["Nov 9, 2025", "Nov 7, 2025", "Nov 5, 2025"]))
            .shared();
        let mut driver = ScriptedDriver::new(site.clone());

        let records = GameLogFetcher::new(&config)
            .try_fetch_new_games(&mut driver, &entity(), &LastDateIndex::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(site.visits(LOG_2025), 0);
    }

    #[tokio::test]
    async fn failures_surface_as_errors_or_empty_lists() {
        let config = ScrapeConfig::for_tests();
        let site = ScriptedSite::new().failing(LOG_2024, 1, FailureKind::Timeout).shared();
        let mut driver = ScriptedDriver::new(site);
        let fetcher = GameLogFetcher::new(&config);

        // Timed out before anything arrived
        let err = fetcher.try_fetch_new_games(&mut driver, &entity(), &LastDateIndex::new()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);

        // Missing page, absorbed
        assert!(fetcher.fetch_new_games(&mut driver, &entity(), &LastDateIndex::new()).await.is_empty());
    }

    #[tokio::test]
    async fn boundary_uses_stored_date_under_page_name() {
        let config = ScrapeConfig::for_tests();
        let site = ScriptedSite::new()
            .page(LOG_2024, &log_page(true, &["Nov 9, 2025", "Nov 7, 2025", "Nov 5, 2025"]))
            .shared();
        let mut driver = ScriptedDriver::new(site);

        let records = GameLogFetcher::new(&config)
            .try_fetch_new_games(&mut driver, &entity(), &stored("A. Player", day(7)))
            .await
            .unwrap();

        let dates: Vec<_> = records.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["Nov 9, 2025"]);
    }

    #[tokio::test]
    async fn slow_load_that_arrived_is_still_read() {
        let config = ScrapeConfig::for_tests();
        let site = ScriptedSite::new()
            .page(LOG_2024, &log_page(true, &["Nov 9, 2025", "Nov 7, 2025"]))
            .arriving_late(LOG_2024, 1)
            .shared();
        let mut driver = ScriptedDriver::new(site.clone());

        let records = GameLogFetcher::new(&config)
            .try_fetch_new_games(&mut driver, &entity(), &LastDateIndex::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(site.visits(LOG_2024), 1);
    }

    #[tokio::test]
    async fn reload_without_rows_times_out() {
        let config = ScrapeConfig::for_tests();
        let empty = log_page(true, &[]).replace(r#"<tr><td colspan="2">Totals</td></tr>"#, "");
        let site = ScriptedSite::new()
            .page(LOG_2024, &log_page(false, &["Apr 10, 2025"]))
            .page(LOG_2025, &empty)
            .shared();
        let mut driver = ScriptedDriver::new(site.clone());

        let err = GameLogFetcher::new(&config)
            .try_fetch_new_games(&mut driver, &entity(), &LastDateIndex::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(site.visits(LOG_2025), 1);
    }

    #[tokio::test]
    async fn in_place_pick_does_not_wait_for_reload() {
        let config = ScrapeConfig {
            reload_timeout: std::time::Duration::from_secs(5),
            ..ScrapeConfig::for_tests()
        };
        let page = r#"<html><body>
            <select><option value="nba" selected>NBA</option></select>
            <select><option value="2024" selected>2024-25</option><option value="2025">2025-26</option></select>
            <select><option value="all" selected>All Games</option></select>
            <table><tbody><tr><td>Nov 9, 2025</td><td>LAL</td><td>GSW</td></tr></tbody></table>
        </body></html>"#;
        let mut driver = ScriptedDriver::with_pages([(LOG_2024, page)]);

        let started = std::time::Instant::now();
        let records = GameLogFetcher::new(&config)
            .try_fetch_new_games(&mut driver, &entity(), &LastDateIndex::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        let season = driver.select_options(&Locator::nth("select", 1)).await.unwrap().unwrap();
        assert!(season[1].selected);
    }
}
