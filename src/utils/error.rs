// src/utils/error.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Longest cause excerpt written to the log for a failed entity.
const EXCERPT_LEN: usize = 100;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("No such element: {0}")]
    ElementNotFound(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Player directory unavailable after {attempts} attempts: {reason}")]
    DirectoryUnavailable { attempts: u32, reason: String },

    #[error("Page driver error: {0}")]
    Driver(String),
}

impl FetchError {
    /// Buckets the failure for the end-of-run breakdown.
    ///
    /// Typed variants map directly; everything else falls back to keyword
    /// matching on the rendered message, since driver and transport errors
    /// only carry their cause as text.
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Timeout(_) => FailureKind::Timeout,
            FetchError::Connection(_) => FailureKind::Connection,
            FetchError::StaleElement(_) => FailureKind::StaleElement,
            FetchError::ElementNotFound(_) => FailureKind::ElementNotFound,
            FetchError::Network(e) if e.is_timeout() => FailureKind::Timeout,
            FetchError::Network(e) if e.is_connect() => FailureKind::Connection,
            other => FailureKind::classify(&other.to_string()),
        }
    }

    /// Timeouts and dropped connections point at the driver or the network,
    /// not at the page being scraped.
    pub fn is_connectivity(&self) -> bool {
        matches!(self.kind(), FailureKind::Timeout | FailureKind::Connection)
    }

    /// Short form of the cause for per-entity log lines.
    pub fn excerpt(&self) -> String {
        let message = self.to_string();
        if message.chars().count() > EXCERPT_LEN {
            let cut: String = message.chars().take(EXCERPT_LEN).collect();
            format!("{}...", cut)
        } else {
            message
        }
    }
}

/// Failure categories reported in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FailureKind {
    #[serde(rename = "Stale Element")]
    StaleElement,
    #[serde(rename = "Timeout")]
    Timeout,
    #[serde(rename = "Element Not Found")]
    ElementNotFound,
    #[serde(rename = "Connection")]
    Connection,
    #[serde(rename = "Other")]
    Other,
}

static STALE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)stale\s+element").expect("Failed to compile STALE_RE")
});

static TIMEOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)time[sd]?\s*out|timeout").expect("Failed to compile TIMEOUT_RE")
});

static NOT_FOUND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)no\s+such\s+element|element\s+not\s+found").expect("Failed to compile NOT_FOUND_RE")
});

static CONNECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)connection\s+(reset|refused|closed|aborted)|broken\s+pipe|error\s+sending\s+request")
        .expect("Failed to compile CONNECTION_RE")
});

impl FailureKind {
    /// Keyword heuristics over an error message. Order matters: a stale
    /// element message can also mention a timeout.
    pub fn classify(message: &str) -> FailureKind {
        if STALE_RE.is_match(message) {
            FailureKind::StaleElement
        } else if TIMEOUT_RE.is_match(message) {
            FailureKind::Timeout
        } else if NOT_FOUND_RE.is_match(message) {
            FailureKind::ElementNotFound
        } else if CONNECTION_RE.is_match(message) {
            FailureKind::Connection
        } else {
            FailureKind::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::StaleElement => "Stale Element",
            FailureKind::Timeout => "Timeout",
            FailureKind::ElementNotFound => "Element Not Found",
            FailureKind::Connection => "Connection",
            FailureKind::Other => "Other",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Dataset is malformed: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Fetching failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
