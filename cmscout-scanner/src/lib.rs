pub mod browser;
pub mod chromium;
pub mod crawler;
pub mod error;
pub mod extractor;
pub mod fingerprint;
pub mod probe;
pub mod result;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use browser::{BrowserEngine, BrowserIdentity, BrowserSession, SessionGuard};
pub use chromium::ChromiumEngine;
pub use crawler::{CrawlContext, Crawler, LinkScope};
pub use error::ScanError;
pub use extractor::{ContentType, PageExtractor, extract_content};
pub use fingerprint::Fingerprinter;
pub use probe::Prober;
pub use result::{CrawlNode, DetectionResult, PageSnapshot, ProbeMap};

/// Desktop Chrome user agent sent by the page fetcher and the browser sessions.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
