//! Run-wide de-duplication store.

use std::collections::HashSet;

use crate::models::{DedupKey, NormalizedListing};

/// Seen identifiers plus the accepted listings in first-seen order.
///
/// Only grows: a key once admitted stays admitted for the whole run.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashSet<DedupKey>,
    listings: Vec<NormalizedListing>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the listing if its identifier is new this run.
    /// Returns false, without touching the store, for a repeat sighting.
    pub fn admit(&mut self, listing: NormalizedListing) -> bool {
        if self.seen.contains(listing.key()) {
            return false;
        }
        self.seen.insert(listing.key().clone());
        self.listings.push(listing);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Accepted listings in first-admitted order.
    pub fn all(&self) -> &[NormalizedListing] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn into_listings(self) -> Vec<NormalizedListing> {
        self.listings
    }
}
