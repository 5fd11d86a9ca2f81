//! Named, randomized, cancellable waits.
//!
//! Every deliberate pause in a crawl goes through [`Pacer::wait`] with a
//! [`Pause`] kind, so tests can swap the clock for one that returns at once
//! and records what would have been waited.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{CrawlError, CrawlResult};

/// Suspension points of a crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pause {
    /// After the one-time warm-up navigation.
    Warmup,
    /// After every navigation, before reading the page.
    PageSettle,
    /// Between pages of one target.
    InterPage,
    /// After a successful target.
    InterTarget,
    /// After a zero-yield target below the failure threshold.
    Cooldown,
    /// Waiting for a block to clear.
    Recovery,
}

impl fmt::Display for Pause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Pause::Warmup => "warm-up",
            Pause::PageSettle => "page settle",
            Pause::InterPage => "inter-page",
            Pause::InterTarget => "inter-target",
            Pause::Cooldown => "cooldown",
            Pause::Recovery => "recovery",
        };
        f.write_str(s)
    }
}

/// Inclusive millisecond range a pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn secs(min: u64, max: u64) -> Self {
        Self {
            min_ms: min * 1000,
            max_ms: max * 1000,
        }
    }

    pub const fn fixed_secs(secs: u64) -> Self {
        Self::secs(secs, secs)
    }

    /// Draw a duration uniformly from the range. A reversed range yields `min_ms`.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }
}

/// Delay ranges for each [`Pause`] kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayPolicy {
    pub warmup: DelayRange,
    pub page_settle: DelayRange,
    pub inter_page: DelayRange,
    pub inter_target: DelayRange,
    pub cooldown: DelayRange,
    pub recovery: DelayRange,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            warmup: DelayRange::secs(2, 4),
            page_settle: DelayRange::secs(3, 6),
            inter_page: DelayRange::secs(3, 7),
            inter_target: DelayRange::secs(5, 10),
            cooldown: DelayRange::secs(15, 30),
            recovery: DelayRange::fixed_secs(60),
        }
    }
}

impl DelayPolicy {
    pub fn range(&self, pause: Pause) -> DelayRange {
        match pause {
            Pause::Warmup => self.warmup,
            Pause::PageSettle => self.page_settle,
            Pause::InterPage => self.inter_page,
            Pause::InterTarget => self.inter_target,
            Pause::Cooldown => self.cooldown,
            Pause::Recovery => self.recovery,
        }
    }
}

/// Performs the actual wait for a pause.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, pause: Pause, duration: Duration);
}

/// Wall-clock waits via `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, _pause: Pause, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and records every requested pause.
#[derive(Debug, Default)]
pub struct RecordingClock {
    pauses: Mutex<Vec<(Pause, Duration)>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause requested so far, in order.
    pub fn pauses(&self) -> Vec<(Pause, Duration)> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<Pause> {
        self.pauses().into_iter().map(|(kind, _)| kind).collect()
    }

    pub fn count(&self, pause: Pause) -> usize {
        self.kinds().into_iter().filter(|k| *k == pause).count()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, pause: Pause, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push((pause, duration));
        }
    }
}

/// Draws pause durations from a [`DelayPolicy`] and waits on a [`Clock`],
/// giving up early when the run is cancelled.
#[derive(Clone)]
pub struct Pacer {
    policy: DelayPolicy,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Pacer {
    pub fn new(policy: DelayPolicy, clock: Arc<dyn Clock>, cancel: CancellationToken) -> Self {
        Self {
            policy,
            clock,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with `Cancelled` if the run has been cancelled.
    pub fn check(&self) -> CrawlResult<()> {
        if self.cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }
        Ok(())
    }

    /// Draw a jittered duration for the given kind.
    pub fn draw(&self, pause: Pause) -> Duration {
        self.policy.range(pause).sample()
    }

    /// Wait for an already drawn duration.
    pub async fn wait(&self, pause: Pause, duration: Duration) -> CrawlResult<()> {
        self.check()?;
        debug!("Waiting {:?} ({})", duration, pause);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CrawlError::Cancelled),
            _ = self.clock.sleep(pause, duration) => Ok(()),
        }
    }
}

impl fmt::Debug for Pacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pacer")
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
