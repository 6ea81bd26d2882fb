// src/gamelogs/directory.rs
use crate::browser::{PageDriver, Waiter};
use crate::config::ScrapeConfig;
use crate::gamelogs::models::EntityRef;
use crate::utils::error::FetchError;
use crate::utils::retry::Backoff;

const ROW_SELECTOR: &str = "table tbody tr";
// Second column holds the player link
const NAME_LINK_SELECTOR: &str = "table tbody tr td:nth-child(2) a";

/// Reads the league-wide player list.
pub struct DirectoryFetcher<'a> {
    config: &'a ScrapeConfig,
}

impl<'a> DirectoryFetcher<'a> {
    pub fn new(config: &'a ScrapeConfig) -> Self {
        Self { config }
    }

    /// Fetches every (name, page URL) pair, retrying with backoff until the
    /// listing table actually has rows.
    pub async fn fetch_entities(&self, driver: &mut dyn PageDriver) -> Result<Vec<EntityRef>, FetchError> {
        let mut backoff = Backoff::new(self.config.directory_retry);
        loop {
            tracing::info!(
                "Loading player directory {} (attempt {}/{})",
                self.config.directory_url,
                backoff.attempt(),
                self.config.directory_retry.max_attempts
            );
            match self.try_fetch(driver).await {
                Ok(entities) => {
                    tracing::info!("Found {} players in directory", entities.len());
                    return Ok(entities);
                }
                Err(e) => match backoff.next_delay() {
                    Some(pause) => {
                        tracing::warn!("Directory not ready ({}); retrying in {:?}", e.excerpt(), pause);
                        tokio::time::sleep(pause).await;
                    }
                    None => {
                        tracing::error!("Giving up on player directory: {}", e);
                        return Err(FetchError::DirectoryUnavailable {
                            attempts: backoff.failures(),
                            reason: e.excerpt(),
                        });
                    }
                },
            }
        }
    }

    async fn try_fetch(&self, driver: &mut dyn PageDriver) -> Result<Vec<EntityRef>, FetchError> {
        driver.goto(&self.config.directory_url).await?;

        // The table shell renders before its rows; wait for data, not markup.
        let waiter = Waiter::new(self.config.page_timeout, self.config.poll_interval);
        waiter.for_count(driver, ROW_SELECTOR, 1).await?;

        let base = driver
            .current_url()
            .await
            .unwrap_or_else(|| self.config.directory_url.clone());
        let base = reqwest::Url::parse(&base).ok();

        let links = driver.query_all(NAME_LINK_SELECTOR).await?;
        let entities = links
            .into_iter()
            .filter_map(|link| {
                let name = link.text.trim().to_string();
                let href = link.attr("href").map(str::trim).filter(|h| !h.is_empty())?;
                if name.is_empty() {
                    return None;
                }
                let url = match &base {
                    Some(base) => base.join(href).ok()?.to_string(),
                    None => href.to_string(),
                };
                Some(EntityRef { name, url })
            })
            .collect();
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{ScriptedDriver, ScriptedSite};
    use crate::utils::error::FailureKind;
    use tokio_test::assert_ok;

    const URL: &str = "https://basketball.realgm.com/nba/players";

    const DIRECTORY: &str = r#"<html><body><table>
        <thead><tr><th>#</th><th>Player</th></tr></thead>
        <tbody>
            <tr><td>1</td><td><a href="/player/LeBron-James/Summary/250">LeBron James</a></td></tr>
            <tr><td>2</td><td><a href="https://basketball.realgm.com/player/Stephen-Curry/Summary/1600">Stephen Curry</a></td></tr>
            <tr><td>3</td><td><a>No Link</a></td></tr>
            <tr><td>4</td><td><a href="/player/Ghost/Summary/9">  </a></td></tr>
        </tbody>
    </table></body></html>"#;

    const EMPTY_TABLE: &str = r#"<html><body><table><tbody></tbody></table></body></html>"#;

    #[tokio::test]
    async fn extracts_players_and_drops_incomplete_rows() {
        let config = ScrapeConfig::for_tests();
        let mut driver = ScriptedDriver::with_pages([(URL, DIRECTORY)]);

        let entities = assert_ok!(DirectoryFetcher::new(&config).fetch_entities(&mut driver).await);
        assert_eq!(
            entities,
            vec![
                EntityRef {
                    name: "LeBron James".into(),
                    url: "https://basketball.realgm.com/player/LeBron-James/Summary/250".into(),
                },
                EntityRef {
                    name: "Stephen Curry".into(),
                    url: "https://basketball.realgm.com/player/Stephen-Curry/Summary/1600".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let config = ScrapeConfig::for_tests();
        let site = ScriptedSite::new()
            .page(URL, DIRECTORY)
            .failing(URL, 2, FailureKind::Timeout)
            .shared();
        let mut driver = ScriptedDriver::new(site.clone());

        let entities = assert_ok!(DirectoryFetcher::new(&config).fetch_entities(&mut driver).await);
        assert_eq!(entities.len(), 2);
        assert_eq!(site.visits(URL), 3);
    }

    #[tokio::test]
    async fn table_without_rows_exhausts_retries() {
        let config = ScrapeConfig::for_tests();
        let site = ScriptedSite::new().page(URL, EMPTY_TABLE).shared();
        let mut driver = ScriptedDriver::new(site.clone());

        let err = DirectoryFetcher::new(&config).fetch_entities(&mut driver).await.unwrap_err();
        assert!(matches!(err, FetchError::DirectoryUnavailable { attempts: 3, .. }), "got {:?}", err);
        assert_eq!(site.visits(URL), 3);
    }
}
