//! Scripted in-memory browser session and helpers for orchestrator tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use zipcrawl::browser::{PageContent, PageSession, WaitPolicy};
use zipcrawl::crawl::{Clock, DelayPolicy, Pacer, Pause, SiteProfile, TargetCrawler};
use zipcrawl::NavigationError;

/// One entry in the shared run timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Visit(String),
    Wait(Pause),
}

/// Navigations and pauses in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<Step>>>);

impl Timeline {
    fn push(&self, step: Step) {
        self.0.lock().unwrap().push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.lock().unwrap().clone()
    }

    pub fn visits(&self) -> Vec<String> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Visit(url) => Some(url),
                Step::Wait(_) => None,
            })
            .collect()
    }

    /// Targets whose first results page was visited, in visit order
    /// (a retry shows up twice).
    pub fn target_visits(&self) -> Vec<String> {
        self.visits()
            .into_iter()
            .filter_map(|url| {
                url.strip_prefix("https://www.zillow.com/homes/")
                    .and_then(|rest| rest.strip_suffix("_rb/"))
                    .map(str::to_string)
            })
            .collect()
    }

    pub fn count(&self, pause: Pause) -> usize {
        self.steps()
            .iter()
            .filter(|s| **s == Step::Wait(pause))
            .count()
    }
}

/// Clock that returns at once and appends to the timeline.
pub struct TimelineClock(pub Timeline);

#[async_trait]
impl Clock for TimelineClock {
    async fn sleep(&self, pause: Pause, _duration: Duration) {
        self.0.push(Step::Wait(pause));
    }
}

/// A session that answers from per-URL scripts. Each URL's responses are
/// served in order; the last one repeats. Unscripted URLs fail to load.
pub struct FakeSession {
    routes: HashMap<String, VecDeque<PageContent>>,
    timeline: Timeline,
    cancel_on: Option<(String, CancellationToken)>,
    closed: Arc<AtomicBool>,
}

impl FakeSession {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            routes: HashMap::new(),
            timeline,
            cancel_on: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn route(mut self, url: impl Into<String>, pages: Vec<PageContent>) -> Self {
        self.routes.insert(url.into(), pages.into());
        self
    }

    /// Script the results pages for one target, page 1 first.
    pub fn target(mut self, target: &str, pages: Vec<Vec<PageContent>>) -> Self {
        let site = SiteProfile::default();
        for (i, page) in pages.into_iter().enumerate() {
            let url = site.search_url(&target.into(), i as u32 + 1);
            self = self.route(url, page);
        }
        self
    }

    pub fn with_entry(self, pages: Vec<PageContent>) -> Self {
        let url = SiteProfile::default().entry_url();
        self.route(url, pages)
    }

    /// Trigger `token` as soon as `url` is requested.
    pub fn cancel_on(mut self, url: impl Into<String>, token: CancellationToken) -> Self {
        self.cancel_on = Some((url.into(), token));
        self
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitPolicy,
        _timeout: Duration,
    ) -> Result<PageContent, NavigationError> {
        self.timeline.push(Step::Visit(url.to_string()));

        if let Some((ref trigger, ref token)) = self.cancel_on {
            if trigger == url {
                token.cancel();
            }
        }

        let Some(queue) = self.routes.get_mut(url) else {
            return Err(NavigationError::Failed {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            });
        };
        let page = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        page.ok_or_else(|| NavigationError::Failed {
            url: url.to_string(),
            reason: "no response scripted".into(),
        })
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn entry_page() -> PageContent {
    PageContent {
        final_url: "https://www.zillow.com/".into(),
        title: "Zillow: Real Estate, Apartments, Mortgages & Home Values".into(),
        content: "<html><body>welcome</body></html>".into(),
    }
}

pub fn blocked_page() -> PageContent {
    PageContent {
        final_url: String::new(),
        title: "Access to this page has been denied".into(),
        content: "<html><body>px-captcha</body></html>".into(),
    }
}

/// A results page carrying `ids` in the primary array.
pub fn results_page(ids: &[u64], total_pages: u32) -> PageContent {
    let list: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "zpid": id,
                "price": format!("${},000", 300 + id),
                "addressWithZip": {"streetAddress": format!("{} Main St", id), "zipcode": "75071"},
                "hdpData": {"homeInfo": {"bedrooms": 3, "homeType": "SINGLE_FAMILY"}}
            })
        })
        .collect();
    let payload = json!({
        "props": {"pageProps": {"searchPageState": {"cat1": {
            "searchResults": {"listResults": list, "mapResults": []},
            "searchList": {"totalPages": total_pages}
        }}}}
    });
    PageContent {
        final_url: String::new(),
        title: "Real Estate & Homes For Sale".into(),
        content: format!(
            r#"<html><head></head><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
            payload
        ),
    }
}

/// A results page whose payload has no listings.
pub fn empty_results_page() -> PageContent {
    results_page(&[], 1)
}

pub fn crawler() -> TargetCrawler {
    TargetCrawler::new(SiteProfile::default()).unwrap()
}

pub fn pacer(timeline: &Timeline, cancel: CancellationToken) -> Pacer {
    Pacer::new(
        DelayPolicy::default(),
        Arc::new(TimelineClock(timeline.clone())),
        cancel,
    )
}
