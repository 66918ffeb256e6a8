//! Browser session management.
//!
//! Wraps a single headless Chrome instance behind [`Session`]: bounded
//! element waits, checked navigation with retry, and wholesale session
//! recreation when the browser process dies or stops responding. At most
//! one logical session exists at a time; recovery replaces it entirely
//! rather than repairing it.

mod errors;

pub use errors::SessionError;

use crate::retry::RetryPolicy;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Grace period for the CDP handler task to drain after a close.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bounded wait for the document root after navigation.
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded wait for the liveness probe before declaring the session dead.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded wait for each cookie-consent shape.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chrome flags matching the portals' rendering quirks; the portals are
/// Angular-heavy and misbehave with background throttling enabled.
const CHROME_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--mute-audio",
    "--disable-blink-features=AutomationControlled",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-extensions",
];

/// Launch settings, kept so the session can recreate itself wholesale.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit Chrome binary path; autodetected when `None`.
    pub chrome_executable: Option<String>,
    pub page_load_timeout: Duration,
}

/// An owned browser session: the Chrome process, its CDP event handler
/// task, and the single page all scraping goes through.
pub struct Session {
    settings: BrowserSettings,
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    /// Set on launch and recycle; cleared once start-of-session setup
    /// (cookie consent) has been replayed on a real page.
    pending_setup: bool,
}

impl Session {
    /// Launch a fresh headless browser session.
    pub async fn launch(settings: BrowserSettings) -> Result<Self, SessionError> {
        let (browser, handler, page) = launch_parts(&settings).await?;
        info!("browser session launched");
        Ok(Self {
            settings,
            browser,
            handler,
            page,
            pending_setup: true,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Discard the current browser process and start a new one.
    ///
    /// Start-of-session setup is replayed lazily on the next successful
    /// navigation, where the consent banner can actually appear.
    pub async fn recycle(&mut self) -> Result<(), SessionError> {
        info!("recycling browser session");
        let (browser, handler, page) = launch_parts(&self.settings).await?;
        let old_browser = std::mem::replace(&mut self.browser, browser);
        let old_handler = std::mem::replace(&mut self.handler, handler);
        self.page = page;
        self.pending_setup = true;
        shutdown_parts(old_browser, old_handler).await;
        Ok(())
    }

    /// Tear the session down. Errors during shutdown are logged, not
    /// surfaced; there is nothing useful a caller can do with them.
    pub async fn close(self) {
        shutdown_parts(self.browser, self.handler).await;
        debug!("browser session closed");
    }

    /// Navigate with retry and recovery.
    ///
    /// Each attempt is a full page load plus a document-root readiness
    /// check; a missing root is a retryable failure, not success. When the
    /// browser itself stops answering, the whole session is recreated
    /// before the next attempt.
    pub async fn goto_checked(&mut self, url: &str, policy: RetryPolicy) -> Result<(), SessionError> {
        for attempt in policy.attempts() {
            match self.try_goto(url).await {
                Ok(()) => {
                    if self.pending_setup {
                        self.accept_cookie_consent().await;
                        self.pending_setup = false;
                    }
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        url,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "navigation attempt failed"
                    );
                    if !self.is_responsive().await {
                        warn!("browser unresponsive, recreating session");
                        self.recycle().await?;
                    }
                    sleep(policy.delay_for(attempt)).await;
                }
            }
        }
        Err(SessionError::NavigationFailed {
            url: url.to_owned(),
            attempts: policy.max_attempts,
        })
    }

    async fn try_goto(&self, url: &str) -> Result<(), SessionError> {
        let load = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        timeout(self.settings.page_load_timeout, load)
            .await
            .map_err(|_| SessionError::WaitTimeout {
                what: format!("navigation to {url}"),
                waited: self.settings.page_load_timeout,
            })??;
        // Readiness: the document root must exist before we call this a load.
        self.wait_for_css("body", READY_TIMEOUT).await?;
        Ok(())
    }

    /// Whether the browser still answers a trivial script evaluation.
    async fn is_responsive(&self) -> bool {
        matches!(timeout(PROBE_TIMEOUT, self.page.evaluate("1 + 1")).await, Ok(Ok(_)))
    }

    /// Best-effort cookie/agreement banner dismissal.
    ///
    /// Two shapes exist across the portals: an Angular consent button, and
    /// an agree-checkbox plus view-files flow. Absence of both is normal.
    pub async fn accept_cookie_consent(&self) {
        if let Ok(button) = self
            .wait_for_xpath("//button[@ng-click='$consent.agree()']", CONSENT_TIMEOUT)
            .await
        {
            if button.click().await.is_ok() {
                info!("cookie consent accepted");
                return;
            }
        }
        match self
            .wait_for_xpath("//input[@id='chkAgree']", CONSENT_TIMEOUT)
            .await
        {
            Ok(agree) => {
                let checked = agree.attribute("checked").await.ok().flatten().is_some();
                if !checked {
                    let _ = agree.click().await;
                }
                if let Ok(view) = self
                    .wait_for_xpath("//input[@id='btnViewFiles']", CONSENT_TIMEOUT)
                    .await
                {
                    if view.click().await.is_ok() {
                        info!("agreement banner accepted");
                    }
                }
            }
            Err(_) => debug!("no cookie or agreement banner present"),
        }
    }

    /// Wait for a single element matching an XPath expression.
    pub async fn wait_for_xpath(
        &self,
        xpath: &str,
        wait: Duration,
    ) -> Result<Element, SessionError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Ok(element) = self.page.find_xpath(xpath).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(SessionError::WaitTimeout {
                    what: xpath.to_owned(),
                    waited: wait,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for at least one element matching an XPath expression.
    pub async fn wait_for_xpaths(
        &self,
        xpath: &str,
        wait: Duration,
    ) -> Result<Vec<Element>, SessionError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Ok(elements) = self.page.find_xpaths(xpath).await {
                if !elements.is_empty() {
                    return Ok(elements);
                }
            }
            if Instant::now() >= deadline {
                return Err(SessionError::WaitTimeout {
                    what: xpath.to_owned(),
                    waited: wait,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for a single element matching a CSS selector.
    pub async fn wait_for_css(&self, selector: &str, wait: Duration) -> Result<Element, SessionError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(SessionError::WaitTimeout {
                    what: selector.to_owned(),
                    waited: wait,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll until the page URL differs from `previous`, or the wait runs out.
    pub async fn wait_until_url_changes(&self, previous: &str, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        loop {
            let current = self.current_url().await;
            if !current.is_empty() && current != previous {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Current page URL, empty when unavailable.
    pub async fn current_url(&self) -> String {
        self.page.url().await.ok().flatten().unwrap_or_default()
    }

    /// Full page HTML, empty when unavailable.
    pub async fn page_source(&self) -> String {
        self.page.content().await.unwrap_or_default()
    }

    /// Clear the value of an input located by CSS selector.
    pub async fn clear_input(&self, selector: &str) -> Result<(), SessionError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({selector:?}); if (el) el.value = ''; }})()"
        );
        self.page.evaluate(script).await?;
        Ok(())
    }

    /// Evaluate a script and return its JSON value, `None` on any failure.
    pub async fn eval_value(&self, script: &str) -> Option<serde_json::Value> {
        self.page
            .evaluate(script.to_owned())
            .await
            .ok()
            .and_then(|result| result.value().cloned())
    }
}

async fn launch_parts(
    settings: &BrowserSettings,
) -> Result<(Browser, JoinHandle<()>, Page), SessionError> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .args(CHROME_ARGS.to_vec())
        .request_timeout(settings.page_load_timeout);
    if let Some(path) = &settings.chrome_executable {
        builder = builder.chrome_executable(path);
    }
    let config = builder.build().map_err(SessionError::Launch)?;

    let (browser, mut cdp_handler) = Browser::launch(config).await?;
    let handler = tokio::spawn(async move {
        while let Some(event) = cdp_handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });
    let page = browser.new_page("about:blank").await?;
    Ok((browser, handler, page))
}

async fn shutdown_parts(mut browser: Browser, handler: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        debug!(error = %e, "browser close reported an error (process may already be gone)");
    }
    let abort = handler.abort_handle();
    if timeout(SHUTDOWN_GRACE, handler).await.is_err() {
        abort.abort();
        debug!("CDP handler did not drain in time, aborting it");
    }
}
