//! Multi-target crawl state machine.
//!
//! One session is opened by the caller and owned here for the whole run.
//! Targets run strictly in order; zero-yield streaks trigger a recovery
//! pause and a retry of the same target, up to a bounded number of times.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::events::{CrawlEvent, EventSink};
use super::pacing::{Pacer, Pause};
use super::state::CrawlContext;
use super::target::{TargetCrawl, TargetCrawler};
use crate::browser::PageSession;
use crate::error::{CrawlError, CrawlResult, NavigationError};
use crate::models::{Coverage, NormalizedListing, StopReason, Target, TargetOutcome};
use crate::storage::OutputWriter;

/// Failure-streak and recovery bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    /// Consecutive zero-yield targets that trigger a recovery pause.
    pub failure_threshold: u32,
    /// Recovery pauses allowed without an intervening success.
    pub max_recoveries: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            max_recoveries: 3,
        }
    }
}

/// Where a recovery pause returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    Warmup,
    Target(usize),
}

/// Orchestrator states. Every wait happens in a named state.
#[derive(Debug)]
pub enum CrawlPhase {
    Idle,
    Warming,
    Fetching { index: usize },
    Evaluating { index: usize, crawl: TargetCrawl },
    CoolingDown { next: usize, pause: Pause },
    Recovering { resume: Resume },
    Done,
    Aborted,
    Cancelled,
}

impl CrawlPhase {
    pub fn name(&self) -> &'static str {
        match self {
            CrawlPhase::Idle => "idle",
            CrawlPhase::Warming => "warming",
            CrawlPhase::Fetching { .. } => "fetching",
            CrawlPhase::Evaluating { .. } => "evaluating",
            CrawlPhase::CoolingDown { .. } => "cooling-down",
            CrawlPhase::Recovering { .. } => "recovering",
            CrawlPhase::Done => "done",
            CrawlPhase::Aborted => "aborted",
            CrawlPhase::Cancelled => "cancelled",
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    Done,
    Aborted,
    Cancelled,
}

impl FinalState {
    /// Process exit status for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            FinalState::Done => 0,
            FinalState::Aborted => 2,
            FinalState::Cancelled => 130,
        }
    }
}

impl fmt::Display for FinalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinalState::Done => "done",
            FinalState::Aborted => "aborted",
            FinalState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub final_state: FinalState,
    pub region_label: String,
    pub targets: Vec<Target>,
    /// One outcome per target, in target order. Unattempted targets are
    /// reported as unprocessed with zero yield.
    pub outcomes: Vec<TargetOutcome>,
    /// Every accepted listing, in first-admitted order.
    pub listings: Vec<NormalizedListing>,
    pub recovery_attempts: u32,
    pub merged_path: Option<PathBuf>,
}

impl RunReport {
    pub fn total_listings(&self) -> usize {
        self.listings.len()
    }

    pub fn per_target(&self) -> BTreeMap<String, usize> {
        self.outcomes
            .iter()
            .map(|o| (o.target.to_string(), o.accepted_count))
            .collect()
    }

    /// Targets with zero or partial coverage.
    pub fn flagged(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.coverage != Coverage::Complete)
    }

    pub fn unprocessed(&self) -> Vec<&Target> {
        self.outcomes
            .iter()
            .filter(|o| o.coverage == Coverage::Unprocessed)
            .map(|o| &o.target)
            .collect()
    }

    pub fn exit_code(&self) -> u8 {
        self.final_state.exit_code()
    }

    /// The library-level error for a run that did not reach `Done`.
    pub fn error(&self) -> Option<CrawlError> {
        match self.final_state {
            FinalState::Done => None,
            FinalState::Aborted => Some(CrawlError::RunAborted {
                attempts: self.recovery_attempts,
                unprocessed: self.unprocessed().len(),
            }),
            FinalState::Cancelled => Some(CrawlError::Cancelled),
        }
    }
}

/// Sequences targets over one session and applies the recovery policy.
pub struct CrawlOrchestrator<S: PageSession> {
    session: S,
    crawler: TargetCrawler,
    pacer: Pacer,
    events: EventSink,
    recovery: RecoveryPolicy,
    max_pages: u32,
    region_label: String,
    output: Option<OutputWriter>,
}

impl<S: PageSession> CrawlOrchestrator<S> {
    pub fn new(session: S, crawler: TargetCrawler, pacer: Pacer) -> Self {
        Self {
            session,
            crawler,
            pacer,
            events: EventSink::disabled(),
            recovery: RecoveryPolicy::default(),
            max_pages: 20,
            region_label: "custom".to_string(),
            output: None,
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_region_label(mut self, label: impl Into<String>) -> Self {
        self.region_label = label.into();
        self
    }

    /// Write per-target snapshots and the merged dataset through `writer`.
    pub fn with_output(mut self, writer: OutputWriter) -> Self {
        self.output = Some(writer);
        self
    }

    /// Run every target, close the session and write the merged output.
    ///
    /// Aborts and cancellations are reported through
    /// [`RunReport::final_state`]; only a failure to write the merged file
    /// is returned as an error.
    pub async fn run(mut self, targets: &[Target]) -> CrawlResult<RunReport> {
        if self.max_pages == 0 {
            self.session.close().await;
            return Err(CrawlError::Config("max_pages must be at least 1".into()));
        }
        let targets = Target::unique(targets.iter().cloned());
        let targets = targets.as_slice();

        let mut ctx = CrawlContext::new(self.pacer.clone(), self.events.clone());
        let mut outcomes: Vec<Option<TargetOutcome>> = vec![None; targets.len()];
        let mut phase = CrawlPhase::Idle;

        let final_state = loop {
            debug!("Crawl phase: {}", phase.name());

            phase = match phase {
                CrawlPhase::Idle => CrawlPhase::Warming,
                CrawlPhase::Warming => self.warm_up(&mut ctx, targets.len()).await,
                CrawlPhase::Fetching { index } => {
                    let target = &targets[index];
                    ctx.emit(CrawlEvent::TargetStarted {
                        target: target.clone(),
                        index,
                        total: targets.len(),
                    })
                    .await;
                    let crawl = self
                        .crawler
                        .crawl(&mut self.session, &mut ctx, target, self.max_pages)
                        .await;

                    if crawl.stop == StopReason::Cancelled {
                        if crawl.pages_fetched > 0 {
                            outcomes[index] = Some(crawl.outcome());
                        }
                        CrawlPhase::Cancelled
                    } else {
                        CrawlPhase::Evaluating { index, crawl }
                    }
                }
                CrawlPhase::Evaluating { index, crawl } => {
                    let outcome = crawl.outcome();
                    ctx.emit(CrawlEvent::TargetFinished(outcome.clone())).await;
                    outcomes[index] = Some(outcome.clone());
                    let next = index + 1;

                    if !outcome.is_zero_yield() {
                        ctx.state.record_success();
                        self.write_snapshot(&ctx, &crawl).await;
                        if next < targets.len() {
                            CrawlPhase::CoolingDown {
                                next,
                                pause: Pause::InterTarget,
                            }
                        } else {
                            CrawlPhase::Done
                        }
                    } else {
                        let streak = ctx.state.record_zero_yield();
                        warn!(
                            "{} yielded no listings ({} consecutive)",
                            outcome.target, streak
                        );
                        if streak >= self.recovery.failure_threshold {
                            CrawlPhase::Recovering {
                                resume: Resume::Target(index),
                            }
                        } else if next < targets.len() {
                            CrawlPhase::CoolingDown {
                                next,
                                pause: Pause::Cooldown,
                            }
                        } else {
                            CrawlPhase::Done
                        }
                    }
                }
                CrawlPhase::CoolingDown { next, pause } => match ctx.pause(pause).await {
                    Ok(_) => CrawlPhase::Fetching { index: next },
                    Err(_) => CrawlPhase::Cancelled,
                },
                CrawlPhase::Recovering { resume } => self.recover(&mut ctx, resume).await,
                CrawlPhase::Done => break FinalState::Done,
                CrawlPhase::Aborted => break FinalState::Aborted,
                CrawlPhase::Cancelled => break FinalState::Cancelled,
            };
        };

        self.session.close().await;

        let recovery_attempts = ctx.state.recovery_attempts();
        let outcomes: Vec<TargetOutcome> = outcomes
            .into_iter()
            .zip(targets)
            .map(|(o, t)| o.unwrap_or_else(|| TargetOutcome::unprocessed(t.clone())))
            .collect();

        let mut report = RunReport {
            final_state,
            region_label: self.region_label.clone(),
            targets: targets.to_vec(),
            outcomes,
            listings: ctx.state.into_store().into_listings(),
            recovery_attempts,
            merged_path: None,
        };

        match final_state {
            FinalState::Done => info!(
                "Crawl finished: {} listings from {} targets",
                report.total_listings(),
                targets.len()
            ),
            _ => warn!(
                "Crawl {}: {} listings kept, {} target(s) unprocessed",
                final_state,
                report.total_listings(),
                report.unprocessed().len()
            ),
        }

        if let Some(ref writer) = self.output {
            report.merged_path = Some(writer.write_merged(&report)?);
        }

        Ok(report)
    }

    async fn warm_up(&mut self, ctx: &mut CrawlContext, target_count: usize) -> CrawlPhase {
        let url = self.crawler.site().entry_url();
        info!("Warming up session at {}", url);
        ctx.emit(CrawlEvent::Warming { url: url.clone() }).await;

        match self.crawler.fetch(&mut self.session, ctx, &url).await {
            Ok((title, content)) => {
                if self.crawler.detector().is_blocked(&title, &content) {
                    warn!("Warm-up page blocked (title {:?})", title);
                    ctx.emit(CrawlEvent::WarmupBlocked { title }).await;
                    // A warm-up block gets exactly one recovery attempt.
                    if ctx.state.recovery_attempts() > 0 || self.recovery.max_recoveries == 0 {
                        return CrawlPhase::Aborted;
                    }
                    return CrawlPhase::Recovering {
                        resume: Resume::Warmup,
                    };
                }
            }
            Err(NavigationError::Cancelled) => return CrawlPhase::Cancelled,
            Err(e) => warn!("Warm-up navigation failed, continuing: {}", e),
        }

        if ctx.pause(Pause::Warmup).await.is_err() {
            return CrawlPhase::Cancelled;
        }
        if target_count == 0 {
            CrawlPhase::Done
        } else {
            CrawlPhase::Fetching { index: 0 }
        }
    }

    async fn recover(&mut self, ctx: &mut CrawlContext, resume: Resume) -> CrawlPhase {
        if ctx.state.recovery_attempts() >= self.recovery.max_recoveries {
            warn!(
                "Recovery limit reached ({} attempts), aborting run",
                ctx.state.recovery_attempts()
            );
            return CrawlPhase::Aborted;
        }

        let attempt = ctx.state.begin_recovery();
        warn!(
            "Possible block, recovery attempt {}/{}",
            attempt, self.recovery.max_recoveries
        );
        ctx.emit(CrawlEvent::Recovering {
            attempt,
            max_attempts: self.recovery.max_recoveries,
        })
        .await;

        if ctx.pause(Pause::Recovery).await.is_err() {
            return CrawlPhase::Cancelled;
        }
        match resume {
            Resume::Warmup => CrawlPhase::Warming,
            Resume::Target(index) => CrawlPhase::Fetching { index },
        }
    }

    async fn write_snapshot(&self, ctx: &CrawlContext, crawl: &TargetCrawl) {
        let Some(ref writer) = self.output else {
            return;
        };
        match writer.write_target(&crawl.target, &crawl.listings) {
            Ok(path) => {
                ctx.emit(CrawlEvent::SnapshotWritten {
                    target: crawl.target.clone(),
                    path,
                })
                .await
            }
            Err(e) => warn!("Failed to write snapshot for {}: {}", crawl.target, e),
        }
    }
}
