//! Browser automation seam.
//!
//! The crawler and extractor only talk to these traits. The Chromium adapter
//! lives in [`crate::chromium`]; tests use the in-memory engine from
//! [`crate::testing`].

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;
pub const SESSION_CLOSE_TIMEOUT_SECS: u64 = 5;

/// Outbound identity applied to a session before it navigates anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserIdentity {
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
}

impl BrowserIdentity {
    /// A stock desktop Chrome on Windows, with the headers a real browser sends.
    pub fn desktop() -> Self {
        Self {
            user_agent: crate::DESKTOP_USER_AGENT.to_string(),
            headers: vec![
                (
                    "Accept-Language".to_string(),
                    "en-US,en;q=0.9,fr-FR;q=0.8,fr;q=0.7".to_string(),
                ),
                ("Accept-Encoding".to_string(), "gzip, deflate, br".to_string()),
                ("DNT".to_string(), "1".to_string()),
                ("Connection".to_string(), "keep-alive".to_string()),
                ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
            ],
        }
    }
}

impl Default for BrowserIdentity {
    fn default() -> Self {
        Self::desktop()
    }
}

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// One live automation session (a browser process with a single tab).
#[async_trait]
pub trait BrowserSession: Send {
    async fn apply_identity(&mut self, identity: &BrowserIdentity) -> Result<()>;

    /// Load `url` and wait for the page to settle, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a script expression against the loaded document.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;

    async fn close(&mut self) -> Result<()>;

    /// Synchronous last-resort teardown, used when a session is dropped unreleased.
    fn abort(&mut self) {}
}

/// Exclusive owner of a [`BrowserSession`] for the duration of one request.
///
/// Call [`SessionGuard::release`] once the work is done, whatever its outcome.
/// If the guard is dropped first (a panic, or the owning future being dropped),
/// the session is aborted from `Drop`.
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
    released: bool,
}

impl SessionGuard {
    pub async fn acquire(engine: &dyn BrowserEngine) -> Result<Self> {
        let session = engine.launch().await?;
        debug!("Browser session acquired");
        Ok(Self {
            session,
            released: false,
        })
    }

    pub fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }

    /// Close the session, aborting it if close fails or takes longer than
    /// [`SESSION_CLOSE_TIMEOUT_SECS`].
    pub async fn release(mut self) {
        self.released = true;
        let limit = Duration::from_secs(SESSION_CLOSE_TIMEOUT_SECS);
        match tokio::time::timeout(limit, self.session.close()).await {
            Ok(Ok(())) => debug!("Browser session released"),
            Ok(Err(e)) => {
                warn!("Browser session did not close cleanly: {}", e);
                self.session.abort();
            }
            Err(_) => {
                warn!(
                    "Browser session did not close within {}s, aborting",
                    SESSION_CLOSE_TIMEOUT_SECS
                );
                self.session.abort();
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!("Browser session dropped without release, aborting");
            self.session.abort();
        }
    }
}
