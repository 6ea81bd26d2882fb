// src/browser/fake.rs
//! In-memory site and driver for tests. Pages are real HTML run through the
//! same `DomState` as the HTTP driver; navigation failures can be scripted
//! per URL and survive driver restarts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::browser::document::DomState;
use crate::browser::{DriverFactory, ElementSnapshot, Locator, Mark, PageDriver, PickEffect, SelectOption};
use crate::utils::error::{FailureKind, FetchError};

#[derive(Debug, Default)]
pub struct ScriptedSite {
    pages: HashMap<String, String>,
    // url -> (failures left, how it fails)
    failures: Mutex<HashMap<String, (u32, FailureKind)>>,
    // url -> loads that deliver the page but still report a timeout
    late: Mutex<HashMap<String, u32>>,
    visits: Mutex<Vec<String>>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// The next `times` loads of `url` fail with `kind`.
    pub fn failing(self, url: &str, times: u32, kind: FailureKind) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), (times, kind));
        self
    }

    /// The next `times` loads of `url` deliver the page, then time out.
    pub fn arriving_late(self, url: &str, times: u32) -> Self {
        self.late.lock().unwrap().insert(url.to_string(), times);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn visits(&self, url: &str) -> usize {
        self.visits.lock().unwrap().iter().filter(|v| v.as_str() == url).count()
    }

    fn arrives_late(&self, url: &str) -> bool {
        match self.late.lock().unwrap().get_mut(url) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    fn load(&self, url: &str) -> Result<String, FetchError> {
        self.visits.lock().unwrap().push(url.to_string());

        if let Some((left, kind)) = self.failures.lock().unwrap().get_mut(url) {
            if *left > 0 {
                *left -= 1;
                return Err(match kind {
                    FailureKind::Timeout => FetchError::Timeout(format!("loading {}", url)),
                    FailureKind::Connection => FetchError::Connection(format!("connection reset loading {}", url)),
                    FailureKind::StaleElement => FetchError::StaleElement(url.to_string()),
                    FailureKind::ElementNotFound => FetchError::ElementNotFound(url.to_string()),
                    FailureKind::Other => FetchError::Driver(format!("scripted failure for {}", url)),
                });
            }
        }

        self.pages
            .get(url)
            .cloned()
            .ok_or(FetchError::Http(reqwest::StatusCode::NOT_FOUND))
    }
}

pub struct ScriptedDriver {
    site: Arc<ScriptedSite>,
    dom: DomState,
}

impl ScriptedDriver {
    pub fn new(site: Arc<ScriptedSite>) -> Self {
        Self { site, dom: DomState::new() }
    }

    pub fn with_pages<'a>(pages: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let site = pages.into_iter().fold(ScriptedSite::new(), |site, (url, html)| site.page(url, html));
        Self::new(site.shared())
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn goto(&mut self, url: &str) -> Result<(), FetchError> {
        let html = self.site.load(url)?;
        self.dom.load(url, html);
        if self.site.arrives_late(url) {
            return Err(FetchError::Timeout(format!("page load for {} did not finish", url)));
        }
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
            .ok_or_else(|| FetchError::ElementNotFound(at.css.clone()))?;
        let value = options
            .get(option_index)
            .ok_or_else(|| FetchError::ElementNotFound(format!("option {}", option_index)))?
            .value
            .clone();

        let target = value.as_deref().and_then(|v| self.dom.option_target(v));
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
        Ok(())
    }
}

/// Launches `ScriptedDriver`s over one shared site; launches past
/// `launch_limit` fail.
pub struct ScriptedFactory {
    site: Arc<ScriptedSite>,
    launches: AtomicU32,
    launch_limit: Option<u32>,
}

impl ScriptedFactory {
    pub fn new(site: Arc<ScriptedSite>) -> Self {
        Self { site, launches: AtomicU32::new(0), launch_limit: None }
    }

    pub fn with_launch_limit(mut self, limit: u32) -> Self {
        self.launch_limit = Some(limit);
        self
    }

    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for ScriptedFactory {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, FetchError> {
        let launched = self.launches.fetch_add(1, Ordering::SeqCst);
        if self.launch_limit.is_some_and(|limit| launched >= limit) {
            return Err(FetchError::Driver("browser failed to start".to_string()));
        }
        Ok(Box::new(ScriptedDriver::new(Arc::clone(&self.site))))
    }
}
