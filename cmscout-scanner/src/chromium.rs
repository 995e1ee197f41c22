//! Headless Chromium over the DevTools protocol.

use crate::browser::{BrowserEngine, BrowserIdentity, BrowserSession};
use crate::error::{Result, ScanError};
use serde::Deserialize;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Launches one headless Chromium process per session.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumEngine {
    pub fn new() -> Self {
        Self {
            executable: None,
            request_timeout: Duration::from_secs(crate::browser::DEFAULT_NAVIGATION_TIMEOUT_SECS),
        }
    }

    /// Use a specific Chrome/Chromium binary instead of searching the usual locations.
    pub fn with_executable(mut self, executable: Option<PathBuf>) -> Self {
        self.executable = executable;
        self
    }

    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(timeout_secs);
        self
    }
}

impl Default for ChromiumEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .request_timeout(self.request_timeout);
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(ScanError::Browser)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScanError::Browser(format!("Failed to launch Chromium: {}", e)))?;

        // The handler drives the DevTools connection and must be polled for the
        // browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(ScanError::Browser(format!("Failed to open a tab: {}", e)));
            }
        };

        info!("Launched headless Chromium session");
        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page,
            handler_task,
            current_url: String::new(),
        }))
    }
}

pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    current_url: String,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn apply_identity(&mut self, identity: &BrowserIdentity) -> Result<()> {
        self.page
            .execute(SetUserAgentOverrideParams::new(identity.user_agent.clone()))
            .await
            .map_err(|e| ScanError::Browser(format!("Failed to set user agent: {}", e)))?;

        let headers: serde_json::Map<String, serde_json::Value> = identity
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect();
        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(headers),
            )))
            .await
            .map_err(|e| ScanError::Browser(format!("Failed to set extra headers: {}", e)))?;

        debug!("Applied browser identity ({} headers)", identity.headers.len());
        Ok(())
    }

    /// Load `url`, then wait for network activity to go quiet. Both steps share
    /// the one `timeout` budget.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.current_url = url.to_string();
        let started = Instant::now();
        let page = &self.page;
        let load = async {
            page.goto(url)
                .await
                .map_err(|e| ScanError::navigation(url, e))?;
            let remaining = timeout
                .saturating_sub(started.elapsed())
                .saturating_sub(IDLE_WAIT_HEADROOM);
            wait_for_network_idle(page, url, remaining).await;
            Ok::<_, ScanError>(())
        };

        match tokio::time::timeout(timeout, load).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScanError::navigation(
                url,
                format!("timed out after {}s", timeout.as_secs()),
            )),
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(|e| ScanError::evaluation(&self.current_url, e))?;

        self.page
            .evaluate_expression(params)
            .await
            .map_err(|e| ScanError::evaluation(&self.current_url, e))?
            .into_value::<serde_json::Value>()
            .map_err(|e| ScanError::evaluation(&self.current_url, e))
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let closed = browser
            .close()
            .await
            .map_err(|e| ScanError::Browser(format!("Failed to close Chromium: {}", e)));
        if closed.is_ok()
            && let Err(e) = browser.wait().await
        {
            warn!("Chromium did not exit cleanly: {}", e);
        }
        self.handler_task.abort();
        closed.map(|_| ())
    }

    fn abort(&mut self) {
        self.handler_task.abort();
        // Dropping the handle tears down the child process.
        drop(self.browser.take());
    }
}

/// Quiet period after which the network counts as idle.
pub const NETWORK_IDLE_MS: u64 = 1000;
const NETWORK_IDLE_POLL_MS: u64 = 250;
/// Kept free at the end of the navigation budget so an idle wait that gives up
/// still returns before the navigation times out.
const IDLE_WAIT_HEADROOM: Duration = Duration::from_millis(500);

/// In-page loop that resolves once the document is complete and no new
/// resource entries appeared for [`NETWORK_IDLE_MS`], or when `budget` runs out.
pub fn network_idle_script(budget: Duration) -> String {
    let budget_ms = budget.as_millis().min(u128::from(u64::MAX)) as u64;
    format!(
        r#"(async () => {{
    const budgetMs = {budget_ms};
    const idleMs = {idle_ms};
    const interval = {poll_ms};
    const count = () => {{
        try {{ return performance.getEntriesByType('resource').length; }} catch (_) {{ return -1; }}
    }};
    const start = Date.now();
    let last = count();
    let stable = 0;
    while (Date.now() - start < budgetMs) {{
        await new Promise(r => setTimeout(r, interval));
        const current = count();
        if (document.readyState === 'complete' && current === last) {{
            stable += interval;
            if (stable >= idleMs) {{
                return {{ idle: true, resources: current, waited_ms: Date.now() - start }};
            }}
        }} else {{
            stable = 0;
        }}
        last = current;
    }}
    return {{ idle: false, resources: last, waited_ms: Date.now() - start }};
}})()"#,
        budget_ms = budget_ms,
        idle_ms = NETWORK_IDLE_MS,
        poll_ms = NETWORK_IDLE_POLL_MS,
    )
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct IdleReport {
    #[serde(default)]
    pub idle: bool,
    #[serde(default)]
    pub resources: i64,
    #[serde(default)]
    pub waited_ms: u64,
}

/// A page that never settles is still extracted; only the outer navigation
/// budget turns slowness into an error.
async fn wait_for_network_idle(page: &Page, url: &str, budget: Duration) {
    if budget.is_zero() {
        return;
    }
    let report = match page.evaluate(network_idle_script(budget)).await {
        Ok(value) => value.into_value::<IdleReport>().unwrap_or_default(),
        Err(e) => {
            debug!("Network idle check failed on {}: {}", url, e);
            return;
        }
    };

    if report.idle {
        debug!(
            "Network idle on {} after {}ms ({} resources)",
            url, report.waited_ms, report.resources
        );
    } else {
        warn!(
            "Network still busy on {} after {}ms, extracting anyway",
            url, report.waited_ms
        );
    }
}
