// src/browser/document.rs
use std::collections::HashMap;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::browser::{ElementSnapshot, Locator, Mark, SelectOption};
use crate::utils::error::FetchError;

static OPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("option").expect("Failed to compile OPTION_SELECTOR")
});

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::InvalidSelector(format!("'{}': {:?}", css, e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn snapshot(element: ElementRef) -> ElementSnapshot {
    let own_text: String = element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.text.to_string()))
        .collect();

    ElementSnapshot {
        text: collapse_whitespace(&element.text().collect::<String>()),
        own_text: collapse_whitespace(&own_text),
        attrs: element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    }
}

/// Server-rendered document state shared by the HTTP and scripted drivers.
///
/// Holds the raw markup and re-parses per query; parsed trees are not `Send`.
/// Every load bumps `generation`, which is what makes earlier marks stale.
#[derive(Debug, Default)]
pub struct DomState {
    url: Option<String>,
    html: String,
    generation: u64,
    // (selector, index) of a select -> chosen option, for in-place picks
    selections: HashMap<Locator, usize>,
}

impl DomState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, url: &str, html: String) {
        self.url = Some(url.to_string());
        self.html = html;
        self.generation += 1;
        self.selections.clear();
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn query_all(&self, css: &str) -> Result<Vec<ElementSnapshot>, FetchError> {
        let sel = selector(css)?;
        let document = Html::parse_document(&self.html);
        Ok(document.select(&sel).map(snapshot).collect())
    }

    pub fn query_within(&self, at: &Locator, css: &str) -> Result<Option<Vec<ElementSnapshot>>, FetchError> {
        let outer = selector(&at.css)?;
        let inner = selector(css)?;
        let document = Html::parse_document(&self.html);
        Ok(document
            .select(&outer)
            .nth(at.index)
            .map(|element| element.select(&inner).map(snapshot).collect()))
    }

    pub fn select_options(&self, at: &Locator) -> Result<Option<Vec<SelectOption>>, FetchError> {
        let outer = selector(&at.css)?;
        let document = Html::parse_document(&self.html);
        let Some(select) = document.select(&outer).nth(at.index) else {
            return Ok(None);
        };

        let mut options: Vec<SelectOption> = select
            .select(&OPTION_SELECTOR)
            .map(|option| SelectOption {
                label: collapse_whitespace(&option.text().collect::<String>()),
                value: option.value().attr("value").map(str::to_string),
                selected: option.value().attr("selected").is_some(),
            })
            .collect();

        let chosen = match self.selections.get(at) {
            Some(&index) => Some(index),
            None => options.iter().position(|o| o.selected),
        };
        // Browsers show the first option when nothing is marked selected.
        let chosen = chosen.or(if options.is_empty() { None } else { Some(0) });
        for (index, option) in options.iter_mut().enumerate() {
            option.selected = Some(index) == chosen;
        }
        Ok(Some(options))
    }

    /// Records a pick that does not reload the page.
    pub fn select_in_place(&mut self, at: &Locator, option_index: usize) {
        self.selections.insert(at.clone(), option_index);
    }

    pub fn mark(&self, at: &Locator) -> Result<Option<Mark>, FetchError> {
        let sel = selector(&at.css)?;
        let document = Html::parse_document(&self.html);
        Ok(document.select(&sel).nth(at.index).map(|_| Mark(self.generation)))
    }

    pub fn is_stale(&self, mark: &Mark) -> bool {
        mark.0 != self.generation
    }

    /// Resolves an option value that points at another page, if it does.
    pub fn option_target(&self, value: &str) -> Option<String> {
        let value = value.trim();
        if !(value.starts_with('/') || value.starts_with("http://") || value.starts_with("https://")) {
            return None;
        }
        match self.url.as_deref().map(reqwest::Url::parse) {
            Some(Ok(base)) => base.join(value).ok().map(|u| u.to_string()),
            _ => reqwest::Url::parse(value).ok().map(|u| u.to_string()),
        }
    }
}
