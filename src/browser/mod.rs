// src/browser/mod.rs
//! Page-fetching and DOM-querying capability consumed by the scraper.
//!
//! Elements are addressed by `Locator` (selector + position) and re-resolved
//! on every call, so callers never hold a handle that a table reload could
//! invalidate. Staleness is observed explicitly through `Mark`s.

pub mod document;
pub mod http;
#[cfg(test)]
pub mod fake;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::utils::error::FetchError;

/// The `index`-th element (document order) matching `css`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub css: String,
    pub index: usize,
}

impl Locator {
    pub fn first(css: &str) -> Self {
        Self::nth(css, 0)
    }

    pub fn nth(css: &str, index: usize) -> Self {
        Self { css: css.to_string(), index }
    }
}

/// Detached copy of an element's readable state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSnapshot {
    /// All descendant text, whitespace collapsed.
    pub text: String,
    /// Only the element's direct text nodes (skips nested spans and links).
    pub own_text: String,
    pub attrs: HashMap<String, String>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub label: String,
    pub value: Option<String>,
    pub selected: bool,
}

/// What picking a select option did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickEffect {
    /// A reload started (or already finished); earlier marks will go stale.
    Reloading,
    /// The value changed without touching the document.
    InPlace,
}

/// Opaque token for "this element as it exists right now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(pub(crate) u64);

#[async_trait]
pub trait PageDriver: Send {
    /// Loads `url` and replaces the current document.
    async fn goto(&mut self, url: &str) -> Result<(), FetchError>;

    async fn current_url(&mut self) -> Option<String>;

    /// Every element matching `css`, in document order.
    async fn query_all(&mut self, css: &str) -> Result<Vec<ElementSnapshot>, FetchError>;

    /// Elements matching `css` inside the element at `at`; `None` when `at`
    /// no longer exists.
    async fn query_within(&mut self, at: &Locator, css: &str) -> Result<Option<Vec<ElementSnapshot>>, FetchError>;

    /// Options of the `<select>` at `at`; `None` when it does not exist.
    async fn select_options(&mut self, at: &Locator) -> Result<Option<Vec<SelectOption>>, FetchError>;

    /// Picks an option. May swap the document out asynchronously.
    async fn choose_option(&mut self, at: &Locator, option_index: usize) -> Result<PickEffect, FetchError>;

    async fn mark(&mut self, at: &Locator) -> Result<Option<Mark>, FetchError>;

    /// True once the marked element has been detached from the document.
    async fn is_stale(&mut self, mark: &Mark) -> Result<bool, FetchError>;

    async fn close(&mut self) -> Result<(), FetchError>;

    async fn count(&mut self, css: &str) -> Result<usize, FetchError> {
        Ok(self.query_all(css).await?.len())
    }
}

/// Hands out fresh drivers; used at startup and after sustained failures.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, FetchError>;
}

/// Bounded polling for DOM conditions.
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Waiter {
    pub fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }

    /// Waits until at least `min` elements match `css`. Returns the count.
    pub async fn for_count(&self, driver: &mut dyn PageDriver, css: &str, min: usize) -> Result<usize, FetchError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let found = driver.count(css).await?;
            if found >= min {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(FetchError::Timeout(format!(
                    "waited {:?} for {} x '{}', found {}",
                    self.timeout, min, css, found
                )));
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    /// Waits until the marked element has gone stale.
    pub async fn for_stale(&self, driver: &mut dyn PageDriver, mark: &Mark) -> Result<(), FetchError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if driver.is_stale(mark).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(FetchError::Timeout(format!("waited {:?} for element to go stale", self.timeout)));
            }
            tokio::time::sleep(self.poll).await;
        }
    }
}

/// Logical role of a game-log filter control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRole {
    League,
    Season,
    Category,
}

impl FilterRole {
    pub const ALL: [FilterRole; 3] = [FilterRole::League, FilterRole::Season, FilterRole::Category];

    /// Position among the page's `<select>` elements when located positionally.
    pub fn position(&self) -> usize {
        match self {
            FilterRole::League => 0,
            FilterRole::Season => 1,
            FilterRole::Category => 2,
        }
    }
}

impl std::fmt::Display for FilterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FilterRole::League => "league",
            FilterRole::Season => "season",
            FilterRole::Category => "category",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterHandle {
    pub role: FilterRole,
    pub locator: Locator,
}

/// Where to find each filter control.
///
/// A role's own selector wins. Roles it misses fall back to position among
/// all `<select>` elements, but only on pages with at least three of them;
/// otherwise the role is treated as absent and left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterLayout {
    pub league: Option<String>,
    pub season: Option<String>,
    pub category: Option<String>,
    pub positional_css: String,
}

impl Default for FilterLayout {
    fn default() -> Self {
        Self {
            league: Some("select[name='league']".to_string()),
            season: Some("select[name='season']".to_string()),
            category: Some("select[name='type']".to_string()),
            positional_css: "select".to_string(),
        }
    }
}

impl FilterLayout {
    fn selector_for(&self, role: FilterRole) -> Option<&str> {
        match role {
            FilterRole::League => self.league.as_deref(),
            FilterRole::Season => self.season.as_deref(),
            FilterRole::Category => self.category.as_deref(),
        }
    }

    /// Resolves a handle per role present on the current page, in
    /// league, season, category order.
    pub async fn locate(&self, driver: &mut dyn PageDriver) -> Result<Vec<FilterHandle>, FetchError> {
        let positional = driver.count(&self.positional_css).await? >= FilterRole::ALL.len();
        let mut handles = Vec::new();

        for role in FilterRole::ALL {
            if let Some(css) = self.selector_for(role) {
                if driver.count(css).await? > 0 {
                    handles.push(FilterHandle { role, locator: Locator::first(css) });
                    continue;
                }
            }
            if positional {
                handles.push(FilterHandle { role, locator: Locator::nth(&self.positional_css, role.position()) });
            } else {
                tracing::debug!("No {} filter on page", role);
            }
        }
        Ok(handles)
    }
}
