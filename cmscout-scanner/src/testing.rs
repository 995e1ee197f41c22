//! In-memory browser engine for tests.
//!
//! Pages are scripted up front; every launch, navigation, evaluation and
//! teardown is recorded so tests can assert on the traffic a crawl produced.

use crate::browser::{BrowserEngine, BrowserIdentity, BrowserSession};
use crate::error::{Result, ScanError};
use crate::result::{Link, PageSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockPage {
    Loaded(PageSnapshot),
    NavigationTimeout,
    EvaluationError,
}

#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub launched: usize,
    pub closed: usize,
    pub aborted: usize,
    pub navigations: Vec<String>,
    pub evaluations: usize,
    pub identities: Vec<BrowserIdentity>,
}

impl EngineStats {
    pub fn visits_to(&self, url: &str) -> usize {
        self.navigations.iter().filter(|u| u.as_str() == url).count()
    }

    /// Sessions that were launched but neither closed nor aborted.
    pub fn leaked(&self) -> usize {
        self.launched - self.closed - self.aborted
    }
}

#[derive(Clone, Default)]
pub struct MockEngine {
    pages: Arc<HashMap<String, MockPage>>,
    stats: Arc<Mutex<EngineStats>>,
    fail_launch: bool,
    hang_on_close: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: PageSnapshot) -> Self {
        Arc::make_mut(&mut self.pages).insert(page.url.clone(), MockPage::Loaded(page));
        self
    }

    pub fn with_failure(mut self, url: &str, failure: MockPage) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), failure);
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    /// Sessions whose `close` never completes.
    pub fn hanging_close(mut self) -> Self {
        self.hang_on_close = true;
        self
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut EngineStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        if self.fail_launch {
            return Err(ScanError::Browser("no browser available".to_string()));
        }
        self.record(|s| s.launched += 1);
        Ok(Box::new(MockSession {
            engine: self.clone(),
            current: None,
        }))
    }
}

pub struct MockSession {
    engine: MockEngine,
    current: Option<String>,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn apply_identity(&mut self, identity: &BrowserIdentity) -> Result<()> {
        let identity = identity.clone();
        self.engine.record(|s| s.identities.push(identity));
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.engine.record(|s| s.navigations.push(url.to_string()));
        match self.engine.pages.get(url) {
            Some(MockPage::Loaded(_)) | Some(MockPage::EvaluationError) => {
                self.current = Some(url.to_string());
                Ok(())
            }
            _ => {
                self.current = None;
                Err(ScanError::navigation(
                    url,
                    format!("timed out after {}s", timeout.as_secs()),
                ))
            }
        }
    }

    async fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value> {
        self.engine.record(|s| s.evaluations += 1);
        let url = self.current.clone().unwrap_or_default();
        match self.engine.pages.get(&url) {
            Some(MockPage::Loaded(page)) => serde_json::to_value(page)
                .map_err(|e| ScanError::evaluation(&url, e)),
            _ => Err(ScanError::evaluation(&url, "document is not available")),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.engine.hang_on_close {
            std::future::pending::<()>().await;
        }
        self.engine.record(|s| s.closed += 1);
        Ok(())
    }

    fn abort(&mut self) {
        self.engine.record(|s| s.aborted += 1);
    }
}

/// A loaded page whose link list is exactly `hrefs`, in order.
pub fn page_with_links(url: &str, hrefs: &[&str]) -> PageSnapshot {
    PageSnapshot {
        url: url.to_string(),
        title: format!("Page {}", url),
        links: hrefs
            .iter()
            .map(|href| Link {
                text: href.to_string(),
                href: href.to_string(),
            })
            .collect(),
        text_content: format!("Content of {}", url),
        ..Default::default()
    }
}
