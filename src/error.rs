//! Error types for the crawl pipeline.

use thiserror::Error;

/// Failure to reach a page through the browser session.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("Navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("Navigation to {url} failed: {reason}")]
    Failed { url: String, reason: String },
    #[error("Navigation cancelled")]
    Cancelled,
}

/// Errors surfaced by the crawl pipeline.
///
/// Most of these are recovered locally (a navigation failure or missing
/// payload only ends pagination for one target). `RunAborted` and
/// `Cancelled` end the run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("Page is a block page (marker {marker:?}, title {title:?})")]
    Blocked { title: String, marker: String },
    #[error("No embedded payload found: {0}")]
    PayloadNotFound(String),
    #[error("Run aborted after {attempts} recovery attempts; {unprocessed} target(s) unprocessed")]
    RunAborted { attempts: u32, unprocessed: usize },
    #[error("Run cancelled")]
    Cancelled,
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CrawlResult<T> = Result<T, CrawlError>;
