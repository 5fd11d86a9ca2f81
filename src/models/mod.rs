//! Data models for listings, targets and per-target outcomes.

mod listing;
mod target;

pub use listing::{DedupKey, NormalizedListing, RawListing};
pub use target::{Coverage, PageFetchResult, StopReason, Target, TargetOutcome};
