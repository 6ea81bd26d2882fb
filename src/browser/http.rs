// src/browser/http.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;

use crate::browser::document::DomState;
use crate::browser::{DriverFactory, ElementSnapshot, Locator, Mark, PageDriver, PickEffect, SelectOption};
use crate::config::ScrapeConfig;
use crate::utils::error::FetchError;

/// `PageDriver` over plain HTTP: pages are fetched with reqwest and queried
/// with scraper. Filter selects whose option values are links are followed,
/// which is how the server-rendered game-log pages reload their table.
pub struct HttpDriver {
    client: reqwest::Client,
    dom: DomState,
    request_delay: Duration,
}

/// Creates a reqwest client that looks like a regular desktop browser.
fn build_client(config: &ScrapeConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.page_timeout)
        .build()
}

fn transport_error(e: reqwest::Error, url: &str) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(format!("loading {}: {}", url, e))
    } else if e.is_connect() {
        FetchError::Connection(format!("loading {}: {}", url, e))
    } else {
        FetchError::Network(e)
    }
}

impl HttpDriver {
    pub fn new(config: &ScrapeConfig) -> Result<Self, FetchError> {
        let client = build_client(config)
            .map_err(|e| FetchError::Driver(format!("could not build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            dom: DomState::new(),
            request_delay: config.request_delay,
        })
    }
}

#[async_trait]
impl PageDriver for HttpDriver {
    async fn goto(&mut self, url: &str) -> Result<(), FetchError> {
        // --- Basic Rate Limiting ---
        tokio::time::sleep(self.request_delay).await;

        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,*/*")
            .send()
            .await
            .map_err(|e| transport_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("HTTP error status: {} for URL: {}", status, url);
            return Err(FetchError::Http(status));
        }

        let body = response.text().await.map_err(|e| transport_error(e, url))?;
        tracing::trace!("Fetched {} bytes from {}", body.len(), url);
        self.dom.load(url, body);
        Ok(())
    }

    async fn current_url(&mut self) -> Option<String> {
        self.dom.url().map(str::to_string)
    }

    async fn query_all(&mut self, css: &str) -> Result<Vec<ElementSnapshot>, FetchError> {
        self.dom.query_all(css)
    }

    async fn query_within(&mut self, at: &Locator, css: &str) -> Result<Option<Vec<ElementSnapshot>>, FetchError> {
        self.dom.query_within(at, css)
    }

    async fn select_options(&mut self, at: &Locator) -> Result<Option<Vec<SelectOption>>, FetchError> {
        self.dom.select_options(at)
    }

    async fn choose_option(&mut self, at: &Locator, option_index: usize) -> Result<PickEffect, FetchError> {
        let options = self
            .dom
            .select_options(at)?
            .ok_or_else(|| FetchError::ElementNotFound(format!("select '{}'[{}]", at.css, at.index)))?;
        let option = options.get(option_index).ok_or_else(|| {
            FetchError::ElementNotFound(format!("option {} of select '{}'[{}]", option_index, at.css, at.index))
        })?;

        let target = option.value.as_deref().and_then(|v| self.dom.option_target(v));
        match target {
            Some(target) => {
                self.goto(&target).await?;
                Ok(PickEffect::Reloading)
            }
            None => {
                self.dom.select_in_place(at, option_index);
                Ok(PickEffect::InPlace)
            }
        }
    }

    async fn mark(&mut self, at: &Locator) -> Result<Option<Mark>, FetchError> {
        self.dom.mark(at)
    }

    async fn is_stale(&mut self, mark: &Mark) -> Result<bool, FetchError> {
        Ok(self.dom.is_stale(mark))
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        // Nothing to tear down beyond the connection pool, which drops with us.
        Ok(())
    }
}

pub struct HttpDriverFactory {
    config: ScrapeConfig,
}

impl HttpDriverFactory {
    pub fn new(config: ScrapeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for HttpDriverFactory {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, FetchError> {
        tracing::info!("Starting HTTP page driver");
        Ok(Box::new(HttpDriver::new(&self.config)?))
    }
}
