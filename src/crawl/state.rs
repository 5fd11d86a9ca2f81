//! Run-scoped mutable state and the context passed to every crawl step.

use std::time::Duration;

use super::dedup::DedupStore;
use super::events::{CrawlEvent, EventSink};
use super::pacing::{Pacer, Pause};
use crate::error::CrawlResult;

/// Counters and the dedup store for one run. Discarded when the run ends.
#[derive(Debug, Default)]
pub struct CrawlState {
    store: DedupStore,
    consecutive_failures: u32,
    recovery_attempts: u32,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DedupStore {
        &mut self.store
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn recovery_attempts(&self) -> u32 {
        self.recovery_attempts
    }

    /// A target admitted something: both streaks are broken.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.recovery_attempts = 0;
    }

    /// Count a zero-yield target. Returns the new streak length.
    pub fn record_zero_yield(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    /// Start a recovery pause. Returns the attempt number (1-based).
    pub fn begin_recovery(&mut self) -> u32 {
        self.consecutive_failures = 0;
        self.recovery_attempts += 1;
        self.recovery_attempts
    }

    pub fn into_store(self) -> DedupStore {
        self.store
    }
}

/// Everything a crawl step needs besides the session: state, pacing and
/// the progress channel.
#[derive(Debug)]
pub struct CrawlContext {
    pub state: CrawlState,
    pub pacer: Pacer,
    pub events: EventSink,
}

impl CrawlContext {
    pub fn new(pacer: Pacer, events: EventSink) -> Self {
        Self {
            state: CrawlState::new(),
            pacer,
            events,
        }
    }

    /// Draw, announce and wait out a pause.
    pub async fn pause(&self, pause: Pause) -> CrawlResult<Duration> {
        self.pacer.check()?;
        let duration = self.pacer.draw(pause);
        self.events
            .emit(CrawlEvent::Waiting { pause, duration })
            .await;
        self.pacer.wait(pause, duration).await?;
        Ok(duration)
    }

    pub async fn emit(&self, event: CrawlEvent) {
        self.events.emit(event).await;
    }
}
