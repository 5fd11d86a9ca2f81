//! Crawl pipeline: block detection, payload location, normalization,
//! de-duplication, per-target pagination and the run orchestrator.

pub mod block;
pub mod dedup;
pub mod events;
pub mod normalize;
pub mod orchestrator;
pub mod pacing;
pub mod payload;
pub mod site;
pub mod state;
pub mod target;

pub use block::{page_title, BlockDetector};
pub use dedup::DedupStore;
pub use events::{CrawlEvent, EventSink};
pub use normalize::{parse_price, ListingNormalizer};
pub use orchestrator::{
    CrawlOrchestrator, CrawlPhase, FinalState, RecoveryPolicy, Resume, RunReport,
};
pub use pacing::{Clock, DelayPolicy, DelayRange, Pacer, Pause, RecordingClock, TokioClock};
pub use payload::{PayloadLocator, SearchPayload, MAX_SEARCH_DEPTH};
pub use site::{SiteProfile, RESULTS_PER_PAGE};
pub use state::{CrawlContext, CrawlState};
pub use target::{PageExtract, TargetCrawl, TargetCrawler};
