use crate::browser::{
    BrowserEngine, BrowserIdentity, BrowserSession, DEFAULT_NAVIGATION_TIMEOUT_SECS, SessionGuard,
};
use crate::error::{Result, ScanError};
use crate::result::PageSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Collects the whole snapshot in one pass over the DOM.
pub const EXTRACTION_SCRIPT: &str = r#"(() => {
    const clean = (value) => (value || '').trim();
    const linkOf = (a) => ({ text: clean(a.textContent), href: a.getAttribute('href') || '' });
    const description = document.querySelector('meta[name="description"]');
    return {
        url: window.location.href,
        title: document.title || '',
        meta_description: description ? description.getAttribute('content') : null,
        headings: Array.from(document.querySelectorAll('h1, h2, h3, h4, h5, h6')).map((h) => ({
            level: Number(h.tagName.substring(1)),
            text: clean(h.textContent),
        })),
        links: Array.from(document.querySelectorAll('a[href]')).map(linkOf),
        images: Array.from(document.querySelectorAll('img')).map((img) => ({
            src: img.getAttribute('src'),
            alt: img.getAttribute('alt'),
        })),
        text_content: document.body ? clean(document.body.textContent) : '',
        pages: Array.from(document.querySelectorAll('nav a, .menu a, .navigation a')).map(linkOf),
    };
})()"#;

/// Which slice of a page the caller is interested in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ContentType {
    Pages,
    Posts,
    Images,
    #[default]
    All,
}

impl ContentType {
    pub const VARIANTS: [&'static str; 4] = ["pages", "posts", "images", "all"];

    /// Navigation-menu links are only reported for `pages` and `all`.
    pub fn includes_navigation(self) -> bool {
        matches!(self, ContentType::Pages | ContentType::All)
    }
}

impl FromStr for ContentType {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pages" => Ok(ContentType::Pages),
            "posts" => Ok(ContentType::Posts),
            "images" => Ok(ContentType::Images),
            "all" => Ok(ContentType::All),
            other => Err(ScanError::ParseError(format!(
                "Unknown content type '{}', expected one of {}",
                other,
                Self::VARIANTS.join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for ContentType {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentType::Pages => "pages",
            ContentType::Posts => "posts",
            ContentType::Images => "images",
            ContentType::All => "all",
        };
        f.write_str(name)
    }
}

/// Loads one URL in a session and snapshots its DOM.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    identity: Option<BrowserIdentity>,
    navigation_timeout: Duration,
}

impl PageExtractor {
    pub fn new() -> Self {
        Self {
            identity: Some(BrowserIdentity::desktop()),
            navigation_timeout: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
        }
    }

    /// `None` leaves the browser's own user agent and headers untouched.
    pub fn with_identity(mut self, identity: Option<BrowserIdentity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout_secs: u64) -> Self {
        self.navigation_timeout = Duration::from_secs(timeout_secs);
        self
    }

    pub fn identity(&self) -> Option<&BrowserIdentity> {
        self.identity.as_ref()
    }

    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    /// Configure the session's outbound identity. Must run before the first navigation.
    pub async fn prepare(&self, session: &mut dyn BrowserSession) -> Result<()> {
        if let Some(identity) = &self.identity {
            session.apply_identity(identity).await?;
        }
        Ok(())
    }

    /// Navigate to `url` and read the snapshot. The session stays usable on error.
    pub async fn extract(&self, session: &mut dyn BrowserSession, url: &str) -> Result<PageSnapshot> {
        debug!("Navigating to {}", url);
        session.navigate(url, self.navigation_timeout).await?;

        let value = session.evaluate(EXTRACTION_SCRIPT).await?;
        let mut snapshot: PageSnapshot =
            serde_json::from_value(value).map_err(|e| ScanError::evaluation(url, e))?;
        if snapshot.url.is_empty() {
            snapshot.url = url.to_string();
        }

        debug!(
            "Extracted {} ({} headings, {} links, {} images)",
            url,
            snapshot.headings.len(),
            snapshot.links.len(),
            snapshot.images.len()
        );
        Ok(snapshot)
    }
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a single page in its own browser session.
///
/// The session is released once the extraction settles, on success and on error.
pub async fn extract_content(
    engine: &dyn BrowserEngine,
    extractor: &PageExtractor,
    url: &str,
    content_type: ContentType,
) -> Result<PageSnapshot> {
    info!("Extracting {} content from {}", content_type, url);

    let mut guard = SessionGuard::acquire(engine).await?;
    let outcome = async {
        extractor.prepare(guard.session()).await?;
        extractor.extract(guard.session(), url).await
    }
    .await;
    guard.release().await;

    let mut snapshot = outcome?;
    if !content_type.includes_navigation() {
        snapshot.pages = None;
    }
    Ok(snapshot)
}
