//! chromiumoxide-backed browser session.

#[cfg(feature = "browser")]
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(feature = "browser")]
use anyhow::Context;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::{BrowserEngineConfig, PageContent, PageSession, WaitPolicy};
#[cfg(feature = "browser")]
use super::{stealth::STEALTH_SCRIPTS, BrowserEngineType};
use crate::error::NavigationError;

/// JavaScript to wait for the document to become interactive.
#[cfg(feature = "browser")]
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// A launched (or remotely connected) browser with a single reusable page.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    config: BrowserEngineConfig,
    browser: Browser,
    page: Page,
    handler: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    /// Launch a browser (or connect to `remote_url`) and open the session page.
    pub async fn open(config: &BrowserEngineConfig) -> Result<Self> {
        let (browser, mut handler) = match config.remote_url.as_deref() {
            Some(remote) => Self::connect_remote(remote, config).await?,
            None => Self::launch(config).await?,
        };

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser page")?;
        page.execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
            .await
            .context("Failed to set user agent")?;

        Ok(Self {
            config: config.clone(),
            browser,
            page,
            handler,
        })
    }

    /// Find Chrome executable.
    fn find_chrome() -> Result<std::path::PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Please install it:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium\n\
             - Or set BROWSER_URL to a running Chrome DevTools endpoint"
        ))
    }

    async fn launch(
        config: &BrowserEngineConfig,
    ) -> Result<(Browser, chromiumoxide::handler::Handler)> {
        info!("Launching browser (headless={})", config.headless);

        let chrome_path = Self::find_chrome()?;
        let (width, height) = config.window;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height);

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox")
            .arg(format!("--window-size={},{}", width, height));

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")
    }

    async fn connect_remote(
        url: &str,
        config: &BrowserEngineConfig,
    ) -> Result<(Browser, chromiumoxide::handler::Handler)> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(config.timeout),
            ..Default::default()
        };

        Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")
    }

    async fn load(&self, url: &str, wait: WaitPolicy) -> Result<PageContent, NavigationError> {
        let failed = |reason: String| NavigationError::Failed {
            url: url.to_string(),
            reason,
        };

        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| failed(format!("invalid URL: {}", e)))?;

        let response = self
            .page
            .execute(nav_params)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if let Some(error_text) = response.result.error_text.clone() {
            return Err(failed(error_text));
        }

        match wait {
            WaitPolicy::Load => {
                self.page
                    .wait_for_navigation()
                    .await
                    .map_err(|e| failed(e.to_string()))?;
            }
            WaitPolicy::DomContentLoaded => {
                match self.page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()).await {
                    Ok(result) => {
                        let state: String = result
                            .into_value()
                            .unwrap_or_else(|_| "unknown".to_string());
                        debug!("Page ready state: {}", state);
                    }
                    Err(e) => debug!("Could not check ready state: {}", e),
                }
            }
        }

        if self.config.engine == BrowserEngineType::Stealth {
            for script in STEALTH_SCRIPTS {
                if let Err(e) = self.page.evaluate(script.to_string()).await {
                    debug!("Stealth script injection skipped: {}", e);
                }
            }
        }

        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| failed(e.to_string()))?
            .unwrap_or_default();
        let content = self
            .page
            .content()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(PageContent {
            final_url,
            title,
            content,
        })
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSession for BrowserSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<PageContent, NavigationError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(timeout, self.load(url, wait)).await {
            Ok(result) => result,
            Err(_) => Err(NavigationError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        self.handler.abort();
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    _config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub async fn open(_config: &BrowserEngineConfig) -> Result<Self> {
        Err(anyhow::anyhow!(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
        ))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageSession for BrowserSession {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitPolicy,
        _timeout: std::time::Duration,
    ) -> Result<PageContent, NavigationError> {
        Err(NavigationError::Failed {
            url: url.to_string(),
            reason: "browser support not compiled".to_string(),
        })
    }

    async fn close(&mut self) {}
}
