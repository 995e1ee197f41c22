use crate::browser::{BrowserEngine, BrowserSession, SessionGuard};
use crate::error::{Result, ScanError};
use crate::extractor::PageExtractor;
use crate::result::CrawlNode;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use url::Url;

/// Hard branching-factor cap: only the first links of a page, in document order.
pub const MAX_LINKS_PER_PAGE: usize = 5;
pub const DEFAULT_CRAWL_DEPTH: usize = 2;

/// How a link's target is matched against the crawl's target domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkScope {
    /// The link's host must equal the target domain.
    #[default]
    Host,
    /// The link's text only has to contain the target domain. Also admits
    /// subdomains and look-alikes such as `evil-example.com`.
    Substring,
}

impl FromStr for LinkScope {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "host" => Ok(LinkScope::Host),
            "substring" => Ok(LinkScope::Substring),
            other => Err(ScanError::ParseError(format!(
                "Unknown link scope '{}', expected 'host' or 'substring'",
                other
            ))),
        }
    }
}

impl fmt::Display for LinkScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkScope::Host => f.write_str("host"),
            LinkScope::Substring => f.write_str("substring"),
        }
    }
}

/// State owned by a single crawl: dropped when the crawl returns.
#[derive(Debug)]
pub struct CrawlContext {
    visited: HashSet<String>,
    target_domain: String,
}

impl CrawlContext {
    pub fn new(target_domain: impl Into<String>) -> Self {
        Self {
            visited: HashSet::new(),
            target_domain: target_domain.into(),
        }
    }

    pub fn target_domain(&self) -> &str {
        &self.target_domain
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn has_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }
}

/// Depth-bounded, cycle-safe, strictly sequential crawler.
pub struct Crawler {
    extractor: PageExtractor,
    scope: LinkScope,
    max_links_per_page: usize,
    target_domain: Option<String>,
}

impl Crawler {
    pub fn new(extractor: PageExtractor) -> Self {
        Self {
            extractor,
            scope: LinkScope::default(),
            max_links_per_page: MAX_LINKS_PER_PAGE,
            target_domain: None,
        }
    }

    pub fn with_scope(mut self, scope: LinkScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_max_links_per_page(mut self, max_links: usize) -> Self {
        self.max_links_per_page = max_links;
        self
    }

    /// Override the domain links are scoped to (defaults to the start URL's host).
    pub fn with_target_domain(mut self, domain: String) -> Self {
        self.target_domain = Some(domain);
        self
    }

    /// A link is followed only if it is absolute http(s) and in the crawl's scope.
    pub fn is_in_scope(&self, href: &str, target_domain: &str) -> bool {
        let Ok(parsed) = Url::parse(href) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }

        match self.scope {
            LinkScope::Host => parsed
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(target_domain)),
            LinkScope::Substring => href.contains(target_domain),
        }
    }

    /// Crawl from `start_url` in a session of its own.
    ///
    /// The session is acquired once, shared by every page of the traversal and
    /// released once the tree is built. `Ok(None)` means the start page could
    /// not be loaded.
    pub async fn crawl_site(
        &self,
        engine: &dyn BrowserEngine,
        start_url: &str,
        depth: usize,
    ) -> Result<Option<CrawlNode>> {
        let parsed = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        let target_domain = match &self.target_domain {
            Some(domain) => domain.clone(),
            None => parsed
                .host_str()
                .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", start_url)))?
                .to_string(),
        };

        if depth == 0 {
            return Ok(None);
        }

        info!(
            "Starting crawl of {} (depth {}, scope {} on {})",
            start_url, depth, self.scope, target_domain
        );

        let mut context = CrawlContext::new(target_domain);
        let mut guard = SessionGuard::acquire(engine).await?;
        let outcome = async {
            self.extractor.prepare(guard.session()).await?;
            Ok::<_, ScanError>(
                self.crawl(guard.session(), &mut context, start_url.to_string(), depth)
                    .await,
            )
        }
        .await;
        guard.release().await;

        if let Ok(root) = &outcome {
            info!(
                "Crawl complete. Visited {} URLs, {} pages in tree",
                context.visited().len(),
                root.as_ref().map(CrawlNode::page_count).unwrap_or(0)
            );
        }
        outcome
    }

    /// One step of the traversal for `(url, depth_remaining, visited)`.
    ///
    /// Returns `None` without any I/O when the depth budget is spent or the URL
    /// was already visited, and `None` after logging when the page fails to load.
    pub fn crawl<'a>(
        &'a self,
        session: &'a mut dyn BrowserSession,
        context: &'a mut CrawlContext,
        url: String,
        depth_remaining: usize,
    ) -> BoxFuture<'a, Option<CrawlNode>> {
        async move {
            if depth_remaining == 0 || context.has_visited(&url) {
                return None;
            }
            context.visited.insert(url.clone());

            let page = match self.extractor.extract(&mut *session, &url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                    return None;
                }
            };

            let mut sub_pages = Vec::new();
            if depth_remaining > 1 {
                for link in page.links.iter().take(self.max_links_per_page) {
                    if !self.is_in_scope(&link.href, context.target_domain()) {
                        debug!("  -> Skipping out-of-scope link {}", link.href);
                        continue;
                    }
                    let child = self
                        .crawl(
                            &mut *session,
                            &mut *context,
                            link.href.clone(),
                            depth_remaining - 1,
                        )
                        .await;
                    if let Some(child) = child {
                        sub_pages.push(child);
                    }
                }
            }

            Some(CrawlNode { page, sub_pages })
        }
        .boxed()
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new(PageExtractor::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEngine, MockPage, page_with_links};

    const A: &str = "https://a.test/";
    const B: &str = "https://a.test/b";
    const C: &str = "https://a.test/c";
    const D: &str = "https://a.test/d";

    fn child_urls(node: &CrawlNode) -> Vec<&str> {
        node.sub_pages.iter().map(|c| c.page.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_cycle_is_visited_once() {
        let engine = MockEngine::new()
            .with_page(page_with_links(A, &[B]))
            .with_page(page_with_links(B, &[A]));

        let root = Crawler::default().crawl_site(&engine, A, 3).await.unwrap().unwrap();

        let stats = engine.stats();
        assert_eq!(stats.visits_to(A), 1);
        assert_eq!(stats.visits_to(B), 1);
        assert_eq!(child_urls(&root), vec![B]);
        assert!(root.sub_pages[0].sub_pages.is_empty());
    }

    #[tokio::test]
    async fn test_zero_depth_makes_no_calls() {
        let engine = MockEngine::new().with_page(page_with_links(A, &[B]));
        let crawler = Crawler::default();

        assert!(crawler.crawl_site(&engine, A, 0).await.unwrap().is_none());
        assert_eq!(engine.stats().launched, 0);

        let mut guard = SessionGuard::acquire(&engine).await.unwrap();
        let mut context = CrawlContext::new("a.test");
        let node = crawler
            .crawl(guard.session(), &mut context, A.to_string(), 0)
            .await;
        guard.release().await;

        assert!(node.is_none());
        assert!(context.visited().is_empty());
        let stats = engine.stats();
        assert!(stats.navigations.is_empty());
        assert_eq!(stats.evaluations, 0);
    }

    #[tokio::test]
    async fn test_visited_url_is_not_fetched_again() {
        let engine = MockEngine::new().with_page(page_with_links(A, &[]));
        let crawler = Crawler::default();

        let mut guard = SessionGuard::acquire(&engine).await.unwrap();
        let mut context = CrawlContext::new("a.test");
        let first = crawler
            .crawl(guard.session(), &mut context, A.to_string(), 2)
            .await;
        let second = crawler
            .crawl(guard.session(), &mut context, A.to_string(), 2)
            .await;
        guard.release().await;

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(engine.stats().visits_to(A), 1);
    }

    #[tokio::test]
    async fn test_at_most_five_links_attempted() {
        let hrefs: Vec<String> = (1..=50).map(|i| format!("https://a.test/p{}", i)).collect();
        let href_refs: Vec<&str> = hrefs.iter().map(String::as_str).collect();

        let mut engine = MockEngine::new().with_page(page_with_links(A, &href_refs));
        for href in &hrefs {
            engine = engine.with_page(page_with_links(href, &[]));
        }

        let root = Crawler::default().crawl_site(&engine, A, 2).await.unwrap().unwrap();

        assert_eq!(root.sub_pages.len(), 5);
        let stats = engine.stats();
        assert_eq!(stats.navigations.len(), 6);
        assert_eq!(
            child_urls(&root),
            vec![
                "https://a.test/p1",
                "https://a.test/p2",
                "https://a.test/p3",
                "https://a.test/p4",
                "https://a.test/p5"
            ]
        );
    }

    #[tokio::test]
    async fn test_cap_applies_before_scope_filtering() {
        let engine = MockEngine::new()
            .with_page(page_with_links(
                A,
                &[
                    "https://other.test/1",
                    "https://other.test/2",
                    "/relative",
                    "mailto:team@a.test",
                    "https://other.test/3",
                    B,
                ],
            ))
            .with_page(page_with_links(B, &[]));

        let root = Crawler::default().crawl_site(&engine, A, 2).await.unwrap().unwrap();

        assert!(root.sub_pages.is_empty());
        assert_eq!(engine.stats().visits_to(B), 0);
    }

    #[tokio::test]
    async fn test_depth_one_never_recurses() {
        let hrefs: Vec<String> = (1..=10).map(|i| format!("https://a.test/p{}", i)).collect();
        let href_refs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
        let engine = MockEngine::new().with_page(page_with_links(A, &href_refs));

        let root = Crawler::default().crawl_site(&engine, A, 1).await.unwrap().unwrap();

        assert!(root.sub_pages.is_empty());
        assert_eq!(engine.stats().navigations, vec![A.to_string()]);
    }

    #[tokio::test]
    async fn test_other_domains_are_excluded() {
        let engine = MockEngine::new()
            .with_page(page_with_links(A, &[B, "https://c.example/"]))
            .with_page(page_with_links(B, &[]))
            .with_page(page_with_links("https://c.example/", &[]));

        let root = Crawler::default().crawl_site(&engine, A, 2).await.unwrap().unwrap();

        assert_eq!(child_urls(&root), vec![B]);
        assert_eq!(engine.stats().visits_to("https://c.example/"), 0);
    }

    #[tokio::test]
    async fn test_substring_scope_admits_look_alike_domains() {
        let look_alike = "https://evil-a.test/";
        let engine = MockEngine::new()
            .with_page(page_with_links(A, &[look_alike]))
            .with_page(page_with_links(look_alike, &[]));

        let strict = Crawler::default().crawl_site(&engine, A, 2).await.unwrap().unwrap();
        assert!(strict.sub_pages.is_empty());

        let lax = Crawler::default()
            .with_scope(LinkScope::Substring)
            .crawl_site(&engine, A, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(child_urls(&lax), vec![look_alike]);
    }

    #[tokio::test]
    async fn test_failed_child_is_omitted_and_crawl_continues() {
        let engine = MockEngine::new()
            .with_page(page_with_links(A, &[B, C]))
            .with_failure(B, MockPage::NavigationTimeout)
            .with_page(page_with_links(C, &[]));

        let root = Crawler::default().crawl_site(&engine, A, 2).await.unwrap().unwrap();

        assert_eq!(child_urls(&root), vec![C]);
        assert_eq!(engine.stats().visits_to(B), 1);
    }

    #[tokio::test]
    async fn test_children_resolve_sequentially_in_document_order() {
        let engine = MockEngine::new()
            .with_page(page_with_links(A, &[B, C]))
            .with_page(page_with_links(B, &[D]))
            .with_page(page_with_links(C, &[]))
            .with_page(page_with_links(D, &[]));

        let root = Crawler::default().crawl_site(&engine, A, 3).await.unwrap().unwrap();

        assert_eq!(
            engine.stats().navigations,
            vec![A.to_string(), B.to_string(), D.to_string(), C.to_string()]
        );
        assert_eq!(root.page_count(), 4);
    }

    #[tokio::test]
    async fn test_unreachable_root_yields_none_and_releases_session() {
        let engine = MockEngine::new().with_failure(A, MockPage::NavigationTimeout);

        let root = Crawler::default().crawl_site(&engine, A, 2).await.unwrap();

        assert!(root.is_none());
        let stats = engine.stats();
        assert_eq!(stats.launched, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.leaked(), 0);
    }

    #[tokio::test]
    async fn test_one_session_for_the_whole_traversal() {
        let engine = MockEngine::new()
            .with_page(page_with_links(A, &[B, C]))
            .with_page(page_with_links(B, &[]))
            .with_page(page_with_links(C, &[]));

        Crawler::default().crawl_site(&engine, A, 2).await.unwrap();

        let stats = engine.stats();
        assert_eq!(stats.launched, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.identities.len(), 1);
    }

    #[tokio::test]
    async fn test_without_bypass_no_identity_is_applied() {
        let engine = MockEngine::new().with_page(page_with_links(A, &[]));
        let crawler = Crawler::new(PageExtractor::new().with_identity(None));

        crawler.crawl_site(&engine, A, 1).await.unwrap();

        assert!(engine.stats().identities.is_empty());
    }

    #[tokio::test]
    async fn test_target_domain_override() {
        let engine = MockEngine::new()
            .with_page(page_with_links(A, &["https://blog.a.test/post"]))
            .with_page(page_with_links("https://blog.a.test/post", &[]));

        let root = Crawler::default()
            .with_target_domain("blog.a.test".to_string())
            .crawl_site(&engine, A, 2)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(child_urls(&root), vec!["https://blog.a.test/post"]);
    }

    #[tokio::test]
    async fn test_invalid_start_url() {
        let engine = MockEngine::new();
        let result = Crawler::default().crawl_site(&engine, "nope", 2).await;
        assert!(matches!(result, Err(ScanError::InvalidUrl(_))));
        assert_eq!(engine.stats().launched, 0);
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("host".parse::<LinkScope>().unwrap(), LinkScope::Host);
        assert_eq!("Substring".parse::<LinkScope>().unwrap(), LinkScope::Substring);
        assert!("domain".parse::<LinkScope>().is_err());
    }

    #[test]
    fn test_is_in_scope_requires_absolute_http() {
        let crawler = Crawler::default();
        assert!(crawler.is_in_scope("https://a.test/x", "a.test"));
        assert!(crawler.is_in_scope("http://A.TEST/x", "a.test"));
        assert!(!crawler.is_in_scope("/x", "a.test"));
        assert!(!crawler.is_in_scope("ftp://a.test/x", "a.test"));
        assert!(!crawler.is_in_scope("https://sub.a.test/x", "a.test"));
    }
}
