//! Targets and per-target results.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One independent query scope (a zip code).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a comma-separated target list, dropping blanks and repeats.
    pub fn parse_list(s: &str) -> Vec<Target> {
        Self::unique(
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(Target::new),
        )
    }

    /// Collect targets in order, keeping only the first occurrence of each.
    pub fn unique(targets: impl IntoIterator<Item = Target>) -> Vec<Target> {
        let mut seen = HashSet::new();
        targets
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Result of a single navigation attempt. Consumed immediately.
#[derive(Debug, Clone)]
pub struct PageFetchResult {
    pub target: Target,
    pub page_number: u32,
    pub url: String,
    pub title: String,
    pub raw_content: String,
    pub navigation_succeeded: bool,
}

/// Why pagination for a target ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the clamped page limit.
    PageLimit,
    /// A page admitted nothing new.
    NoNewListings,
    /// The page had no payload or no listings in it.
    PayloadNotFound,
    NavigationFailed,
    Blocked,
    Cancelled,
}

/// How well a target was covered, for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Pagination ran to a natural end.
    Complete,
    /// Some listings were captured before a block, navigation failure or cancel.
    Partial,
    /// Pagination ended naturally with nothing admitted.
    Empty,
    /// Blocked before anything was admitted.
    Blocked,
    /// Never attempted (run aborted or cancelled first).
    Unprocessed,
}

impl Coverage {
    pub fn classify(accepted: usize, stop: StopReason) -> Self {
        let interrupted = matches!(
            stop,
            StopReason::Blocked | StopReason::NavigationFailed | StopReason::Cancelled
        );
        match (accepted, interrupted) {
            (0, _) if stop == StopReason::Blocked => Coverage::Blocked,
            (0, _) => Coverage::Empty,
            (_, true) => Coverage::Partial,
            (_, false) => Coverage::Complete,
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Coverage::Complete => "complete",
            Coverage::Partial => "partial",
            Coverage::Empty => "empty",
            Coverage::Blocked => "blocked",
            Coverage::Unprocessed => "unprocessed",
        };
        f.write_str(s)
    }
}

/// Outcome of one target attempt. Feeds the failure-streak accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub target: Target,
    pub accepted_count: usize,
    pub blocked: bool,
    pub pages_fetched: u32,
    pub coverage: Coverage,
}

impl TargetOutcome {
    pub fn unprocessed(target: Target) -> Self {
        Self {
            target,
            accepted_count: 0,
            blocked: false,
            pages_fetched: 0,
            coverage: Coverage::Unprocessed,
        }
    }

    pub fn is_zero_yield(&self) -> bool {
        self.accepted_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let targets = Target::parse_list("75071, 75070,,75069 ,75070");
        assert_eq!(
            targets,
            vec![
                Target::from("75071"),
                Target::from("75070"),
                Target::from("75069")
            ]
        );
    }

    #[test]
    fn test_coverage_classification() {
        assert_eq!(Coverage::classify(0, StopReason::Blocked), Coverage::Blocked);
        assert_eq!(
            Coverage::classify(0, StopReason::NavigationFailed),
            Coverage::Empty
        );
        assert_eq!(
            Coverage::classify(12, StopReason::Blocked),
            Coverage::Partial
        );
        assert_eq!(
            Coverage::classify(12, StopReason::NoNewListings),
            Coverage::Complete
        );
        assert_eq!(
            Coverage::classify(3, StopReason::PageLimit),
            Coverage::Complete
        );
    }
}
