//! Progress events emitted during a crawl run.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use super::pacing::Pause;
use crate::models::{Target, TargetOutcome};

/// Events emitted during crawl operations.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// Warm-up navigation to the entry page started
    Warming { url: String },
    /// The warm-up page itself looked blocked
    WarmupBlocked { title: String },
    /// A target is about to be crawled
    TargetStarted {
        target: Target,
        index: usize,
        total: usize,
    },
    /// A page loaded; title as seen
    PageFetched {
        target: Target,
        page: u32,
        title: String,
    },
    /// Navigation failed or timed out
    NavigationFailed {
        target: Target,
        page: u32,
        error: String,
    },
    /// Block markers matched on a page
    PageBlocked {
        target: Target,
        page: u32,
        title: String,
    },
    /// No payload (or no listings) on a page
    PayloadMissing { target: Target, page: u32 },
    /// Page limit resolved from the first page's pagination data
    PageLimit {
        target: Target,
        total_pages: u32,
        max_pages: u32,
    },
    /// Listings found on a page and how many were new this run
    PageAdmitted {
        target: Target,
        page: u32,
        found: usize,
        new: usize,
    },
    /// Target finished (successfully or not)
    TargetFinished(TargetOutcome),
    /// Per-target snapshot written
    SnapshotWritten { target: Target, path: PathBuf },
    /// Deliberate wait started
    Waiting { pause: Pause, duration: Duration },
    /// Entering recovery
    Recovering { attempt: u32, max_attempts: u32 },
}

/// Optional event channel. Sending never fails the crawl.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<CrawlEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<CrawlEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn emit(&self, event: CrawlEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event).await;
        }
    }
}
