//! Rendered-page fetch capability.
//!
//! The crawl pipeline only sees the [`PageSession`] trait: navigate to a URL
//! and get back the title and rendered HTML. [`BrowserSession`] implements it
//! on top of chromiumoxide (CDP) with stealth evasion, reusing one page for
//! the whole run.

mod config;
mod session;
#[cfg(feature = "browser")]
mod stealth;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use config::{BrowserEngineConfig, BrowserEngineType};
pub use session::BrowserSession;

use crate::error::NavigationError;

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// `DOMContentLoaded` has fired (document is interactive).
    #[default]
    DomContentLoaded,
    /// The full `load` event has fired.
    Load,
}

/// Rendered page returned by a navigation.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// URL after redirects.
    pub final_url: String,
    pub title: String,
    pub content: String,
}

/// One live browsing session. Exactly one navigation is in flight at a time.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<PageContent, NavigationError>;

    /// Release the session. Further navigations are not expected.
    async fn close(&mut self);
}
