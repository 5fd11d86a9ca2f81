//! zipcrawl - resilient multi-target listing crawler.
//!
//! Drives a single stealth browser session across an ordered list of
//! search targets (zip codes), pulls the embedded search payload out of
//! every result page, and merges the listings into one de-duplicated
//! dataset per run.

pub mod browser;
pub mod config;
pub mod crawl;
pub mod error;
pub mod models;
pub mod regions;
pub mod storage;

pub use error::{CrawlError, CrawlResult, NavigationError};
