//! Pagination over one target against the shared session.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::block::{page_title, BlockDetector};
use super::events::CrawlEvent;
use super::normalize::ListingNormalizer;
use super::pacing::Pause;
use super::payload::PayloadLocator;
use super::site::SiteProfile;
use super::state::CrawlContext;
use crate::browser::{PageSession, WaitPolicy};
use crate::error::{CrawlError, CrawlResult, NavigationError};
use crate::models::{
    Coverage, NormalizedListing, PageFetchResult, RawListing, StopReason, Target, TargetOutcome,
};
use crate::storage::write_html_dump;

/// Listings admitted while crawling one target, and why it stopped.
#[derive(Debug, Clone)]
pub struct TargetCrawl {
    pub target: Target,
    /// Newly admitted listings, in admission order. Already in the store.
    pub listings: Vec<NormalizedListing>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

impl TargetCrawl {
    pub fn outcome(&self) -> TargetOutcome {
        TargetOutcome {
            target: self.target.clone(),
            accepted_count: self.listings.len(),
            blocked: self.stop == StopReason::Blocked,
            pages_fetched: self.pages_fetched,
            coverage: Coverage::classify(self.listings.len(), self.stop),
        }
    }
}

/// Listings recovered from a single saved page, deduplicated within the page.
#[derive(Debug, Clone)]
pub struct PageExtract {
    pub total_pages: u32,
    pub raw_count: usize,
    pub listings: Vec<NormalizedListing>,
}

/// Drives fetch → block check → payload → normalize → admit for one target.
#[derive(Debug, Clone)]
pub struct TargetCrawler {
    site: SiteProfile,
    detector: BlockDetector,
    locator: PayloadLocator,
    normalizer: ListingNormalizer,
    wait: WaitPolicy,
    nav_timeout: Duration,
    html_dump_dir: Option<PathBuf>,
}

impl TargetCrawler {
    pub fn new(site: SiteProfile) -> CrawlResult<Self> {
        Ok(Self {
            detector: BlockDetector::from_profile(&site),
            locator: PayloadLocator::from_profile(&site)?,
            normalizer: ListingNormalizer::new(site.clone()),
            site,
            wait: WaitPolicy::default(),
            nav_timeout: Duration::from_secs(60),
            html_dump_dir: None,
        })
    }

    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_nav_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout = timeout;
        self
    }

    /// Save every fetched page's HTML under `dir` as `{target}_p{N}.html`.
    pub fn with_html_dump(mut self, dir: Option<PathBuf>) -> Self {
        self.html_dump_dir = dir;
        self
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    pub fn detector(&self) -> &BlockDetector {
        &self.detector
    }

    /// Navigate once, racing the run's cancel token.
    pub async fn fetch<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        ctx: &CrawlContext,
        url: &str,
    ) -> Result<(String, String), NavigationError> {
        let cancel = ctx.pacer.cancel_token().clone();
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NavigationError::Cancelled),
            page = session.navigate(url, self.wait, self.nav_timeout) => page?,
        };
        Ok((page.title, page.content))
    }

    /// Fetch one results page. A failed navigation is reported and comes
    /// back with `navigation_succeeded` unset; `None` means cancelled.
    async fn fetch_page<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        ctx: &CrawlContext,
        target: &Target,
        page: u32,
    ) -> Option<PageFetchResult> {
        let url = self.site.search_url(target, page);
        let (title, raw_content, navigation_succeeded) =
            match self.fetch(session, ctx, &url).await {
                Ok((title, content)) => (title, content, true),
                Err(NavigationError::Cancelled) => return None,
                Err(e) => {
                    warn!("{}: {}", target, e);
                    ctx.emit(CrawlEvent::NavigationFailed {
                        target: target.clone(),
                        page,
                        error: e.to_string(),
                    })
                    .await;
                    (String::new(), String::new(), false)
                }
            };

        Some(PageFetchResult {
            target: target.clone(),
            page_number: page,
            url,
            title,
            raw_content,
            navigation_succeeded,
        })
    }

    /// Exhaust pagination for `target`, admitting listings into the shared
    /// store. Never fails: every problem becomes a [`StopReason`].
    pub async fn crawl<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        ctx: &mut CrawlContext,
        target: &Target,
        max_pages: u32,
    ) -> TargetCrawl {
        let start = ctx.state.store().len();
        let mut limit = max_pages;
        let mut page = 1;
        let mut pages_fetched = 0;
        let mut stop = StopReason::PageLimit;

        while page <= limit {
            if ctx.pacer.is_cancelled() {
                stop = StopReason::Cancelled;
                break;
            }

            let Some(fetched) = self.fetch_page(session, ctx, target, page).await else {
                stop = StopReason::Cancelled;
                break;
            };
            if !fetched.navigation_succeeded {
                stop = StopReason::NavigationFailed;
                break;
            }
            pages_fetched += 1;

            ctx.emit(CrawlEvent::PageFetched {
                target: target.clone(),
                page,
                title: fetched.title.clone(),
            })
            .await;
            if ctx.pause(Pause::PageSettle).await.is_err() {
                stop = StopReason::Cancelled;
                break;
            }

            if let Some(ref dir) = self.html_dump_dir {
                if let Err(e) = write_html_dump(dir, target, page, &fetched.raw_content) {
                    warn!("Failed to save page HTML for {} p{}: {}", target, page, e);
                }
            }

            if let Some(marker) = self
                .detector
                .matched_marker(&fetched.title, &fetched.raw_content)
            {
                warn!(
                    "{} page {} blocked (marker {:?}, title {:?})",
                    target, page, marker, fetched.title
                );
                ctx.emit(CrawlEvent::PageBlocked {
                    target: target.clone(),
                    page,
                    title: fetched.title.clone(),
                })
                .await;
                stop = StopReason::Blocked;
                break;
            }

            let payload = match self.locator.locate(&fetched.raw_content) {
                Ok(payload) => payload,
                Err(e) => {
                    debug!("{} page {}: {}", target, page, e);
                    ctx.emit(CrawlEvent::PayloadMissing {
                        target: target.clone(),
                        page,
                    })
                    .await;
                    stop = StopReason::PayloadNotFound;
                    break;
                }
            };

            if page == 1 {
                let total_pages = self.locator.total_pages(&payload);
                limit = limit.min(total_pages);
                ctx.emit(CrawlEvent::PageLimit {
                    target: target.clone(),
                    total_pages,
                    max_pages: limit,
                })
                .await;
            }

            let raw = self.locator.listings(&payload);
            if raw.is_empty() {
                ctx.emit(CrawlEvent::PayloadMissing {
                    target: target.clone(),
                    page,
                })
                .await;
                stop = StopReason::PayloadNotFound;
                break;
            }

            let mut new_count = 0;
            for listing in self.normalize_all(&raw) {
                if ctx.state.store_mut().admit(listing) {
                    new_count += 1;
                }
            }
            info!(
                "{} page {}: {} listings, {} new",
                target,
                page,
                raw.len(),
                new_count
            );
            ctx.emit(CrawlEvent::PageAdmitted {
                target: target.clone(),
                page,
                found: raw.len(),
                new: new_count,
            })
            .await;

            if new_count == 0 {
                stop = StopReason::NoNewListings;
                break;
            }
            if page >= limit {
                stop = StopReason::PageLimit;
                break;
            }

            page += 1;
            if ctx.pause(Pause::InterPage).await.is_err() {
                stop = StopReason::Cancelled;
                break;
            }
        }

        TargetCrawl {
            target: target.clone(),
            listings: ctx.state.store().all()[start..].to_vec(),
            pages_fetched,
            stop,
        }
    }

    /// Run the block check, locator and normalizer on saved page content,
    /// without a session or the run-wide store.
    pub fn extract(&self, content: &str) -> CrawlResult<PageExtract> {
        let title = page_title(content);
        if let Some(marker) = self.detector.matched_marker(&title, content) {
            return Err(CrawlError::Blocked {
                marker: marker.to_string(),
                title,
            });
        }

        let payload = self.locator.locate(content)?;
        let raw = self.locator.listings(&payload);
        let mut store = super::dedup::DedupStore::new();
        for listing in self.normalize_all(&raw) {
            store.admit(listing);
        }
        Ok(PageExtract {
            total_pages: self.locator.total_pages(&payload),
            raw_count: raw.len(),
            listings: store.into_listings(),
        })
    }

    fn normalize_all<'a>(
        &'a self,
        raw: &'a [RawListing],
    ) -> impl Iterator<Item = NormalizedListing> + 'a {
        raw.iter().filter_map(|r| self.normalizer.normalize(r))
    }
}
