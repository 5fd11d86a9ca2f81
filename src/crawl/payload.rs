//! Locate and parse the structured-data payload embedded in a results page.
//!
//! The payload is a JSON document inside a marked `<script>` element. The
//! listing arrays and pagination counters live at varying depths inside it,
//! sometimes inside JSON serialized into string values, so lookups are a
//! bounded recursive key search.

use std::collections::HashSet;

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::site::{SiteProfile, RESULTS_PER_PAGE};
use crate::error::{CrawlError, CrawlResult};
use crate::models::{DedupKey, RawListing};

/// Maximum nesting depth searched for a key. Deeper keys are "not found".
pub const MAX_SEARCH_DEPTH: usize = 10;

/// String values at least this long are probed for embedded JSON objects.
const EMBEDDED_JSON_MIN_LEN: usize = 500;

/// Parsed payload of one results page.
#[derive(Debug, Clone)]
pub struct SearchPayload {
    root: Value,
}

/// Finds the payload in page content and recovers listings and page counts.
#[derive(Debug, Clone)]
pub struct PayloadLocator {
    selector: Selector,
    primary_key: String,
    secondary_key: String,
    total_pages_key: String,
    total_count_key: String,
    id_field: String,
}

impl PayloadLocator {
    pub fn from_profile(site: &SiteProfile) -> CrawlResult<Self> {
        let selector = Selector::parse(&site.payload_selector).map_err(|e| {
            CrawlError::Config(format!(
                "Invalid payload selector '{}': {}",
                site.payload_selector, e
            ))
        })?;

        Ok(Self {
            selector,
            primary_key: site.primary_results_key.clone(),
            secondary_key: site.secondary_results_key.clone(),
            total_pages_key: site.total_pages_key.clone(),
            total_count_key: site.total_count_key.clone(),
            id_field: site.id_field.clone(),
        })
    }

    /// Find the marked script element and parse its body.
    pub fn locate(&self, content: &str) -> CrawlResult<SearchPayload> {
        let raw = {
            let document = Html::parse_document(content);
            let element = document.select(&self.selector).next().ok_or_else(|| {
                CrawlError::PayloadNotFound("payload marker not present".to_string())
            })?;
            element.text().collect::<String>()
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CrawlError::PayloadNotFound(
                "payload element is empty".to_string(),
            ));
        }

        let root: Value = serde_json::from_str(raw)
            .map_err(|e| CrawlError::PayloadNotFound(format!("payload is not valid JSON: {}", e)))?;
        if !root.is_object() {
            return Err(CrawlError::PayloadNotFound(
                "payload is not a JSON object".to_string(),
            ));
        }

        debug!("Located payload ({} bytes)", raw.len());
        Ok(SearchPayload { root })
    }

    /// Listing records on this page.
    ///
    /// The first non-empty results array becomes the primary list; records
    /// from the other array are appended only when their identifier is new.
    pub fn listings(&self, payload: &SearchPayload) -> Vec<RawListing> {
        let primary = find_non_empty_array(&payload.root, &self.primary_key);
        let secondary = find_non_empty_array(&payload.root, &self.secondary_key);

        let (first, second) = match (primary, secondary) {
            (Some(p), s) => (p, s),
            (None, Some(s)) => (s, None),
            (None, None) => return Vec::new(),
        };

        let mut listings: Vec<RawListing> = first
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        debug!("Primary results array has {} listings", listings.len());

        if let Some(extra) = second {
            let mut seen: HashSet<DedupKey> = listings
                .iter()
                .filter_map(|l| l.get(&self.id_field).and_then(DedupKey::from_value))
                .collect();
            let before = listings.len();
            for value in extra {
                let Value::Object(map) = value else { continue };
                let Some(key) = map.get(&self.id_field).and_then(DedupKey::from_value) else {
                    continue;
                };
                if seen.insert(key) {
                    listings.push(map);
                }
            }
            debug!(
                "Merged {} additional listings from secondary results",
                listings.len() - before
            );
        }

        listings
    }

    /// Total page estimate: explicit page count, else result count / page
    /// size rounded up, else 1.
    pub fn total_pages(&self, payload: &SearchPayload) -> u32 {
        if let Some(pages) = find_positive_int(&payload.root, &self.total_pages_key) {
            return pages.min(u32::MAX as u64) as u32;
        }

        if let Some(count) = find_positive_int(&payload.root, &self.total_count_key) {
            let pages = count.div_ceil(RESULTS_PER_PAGE).max(1);
            return pages.min(u32::MAX as u64) as u32;
        }

        1
    }
}

fn positive_int(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (n > 0).then_some(n)
}

fn find_positive_int(root: &Value, key: &str) -> Option<u64> {
    deep_find(root, key, MAX_SEARCH_DEPTH, &|v| positive_int(v).is_some())
        .as_ref()
        .and_then(positive_int)
}

fn find_non_empty_array(root: &Value, key: &str) -> Option<Vec<Value>> {
    match deep_find(root, key, MAX_SEARCH_DEPTH, &|v| {
        v.as_array().is_some_and(|a| !a.is_empty())
    }) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Depth-bounded search for the first value under `key` that `accept`s.
///
/// Descends through objects, and through long string values that parse
/// as JSON objects. Each level, including an embedded-JSON hop, costs one
/// unit of depth.
pub fn deep_find(
    value: &Value,
    key: &str,
    depth: usize,
    accept: &dyn Fn(&Value) -> bool,
) -> Option<Value> {
    if depth == 0 {
        return None;
    }

    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                if accept(found) {
                    return Some(found.clone());
                }
            }
            map.values()
                .find_map(|child| deep_find(child, key, depth - 1, accept))
        }
        Value::String(s) if s.len() >= EMBEDDED_JSON_MIN_LEN => {
            if !s.trim_start().starts_with('{') {
                return None;
            }
            match serde_json::from_str::<Value>(s) {
                Ok(inner) => deep_find(&inner, key, depth - 1, accept),
                Err(_) => None,
            }
        }
        _ => None,
    }
}
