//! Browser engine configuration types.
//!
//! These live outside the `browser` feature gate so config parsing works
//! without chromiumoxide compiled in.

use serde::{Deserialize, Serialize};

use super::WaitPolicy;

/// Browser engine types.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineType {
    /// Standard chromiumoxide with stealth patches (default).
    #[default]
    Stealth,

    /// No stealth patches (for debugging).
    Standard,
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Browser engine type.
    #[serde(default)]
    pub engine: BrowserEngineType,

    /// Run in headless mode (default: true).
    /// Set to false when a challenge has to be solved by hand.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Navigation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Page readiness a navigation waits for (`dom_content_loaded` or `load`).
    #[serde(default)]
    pub wait_until: WaitPolicy,

    /// Browser window size as (width, height).
    #[serde(default = "default_window")]
    pub window: (u32, u32),

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    60
}

fn default_window() -> (u32, u32) {
    (1366, 768)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngineType::default(),
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            wait_until: WaitPolicy::default(),
            window: default_window(),
            user_agent: default_user_agent(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `SOCKS_PROXY` - SOCKS proxy for browser traffic (e.g., "socks5://127.0.0.1:9050")
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BROWSER_URL") {
            if !val.is_empty() {
                self.remote_url = Some(val);
            }
        }
        if self.proxy.is_none() {
            if let Ok(val) = std::env::var("SOCKS_PROXY") {
                if !val.is_empty() {
                    self.proxy = Some(val);
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: BrowserEngineConfig = toml::from_str("").unwrap();
        assert!(config.headless);
        assert_eq!(config.timeout, 60);
        assert_eq!(config.window, (1366, 768));
        assert_eq!(config.engine, BrowserEngineType::Stealth);
        assert_eq!(config.wait_until, WaitPolicy::DomContentLoaded);
    }

    #[test]
    fn test_engine_parsing() {
        let config: BrowserEngineConfig =
            toml::from_str("engine = \"standard\"\nheadless = false\nwait_until = \"load\"")
                .unwrap();
        assert_eq!(config.engine, BrowserEngineType::Standard);
        assert!(!config.headless);
        assert_eq!(config.wait_until, WaitPolicy::Load);
    }
}
