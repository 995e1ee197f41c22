//! CMS fingerprinting.
//!
//! Every candidate CMS earns an additive score from three kinds of evidence:
//! pattern hits in the raw HTML (+2 each), a matching generator meta tag (+3)
//! and reachable characteristic admin paths (+2 each). The highest score wins;
//! candidates are evaluated in priority order and only a strictly greater
//! score replaces the current leader, so earlier candidates win ties.

use crate::error::{Result, ScanError};
use crate::probe::{DEFAULT_PROBE_TIMEOUT_SECS, Prober};
use crate::result::{DetectionResult, ProbeMap};
use crate::DESKTOP_USER_AGENT;
use regex::{Regex, RegexBuilder};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

const PATTERN_WEIGHT: u32 = 2;
const GENERATOR_WEIGHT: u32 = 3;
const PROBE_WEIGHT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    WpAdmin,
    WpJson,
    JoomlaAdmin,
    DrupalAdmin,
}

impl ProbeMap {
    pub fn get(&self, kind: ProbeKind) -> bool {
        match kind {
            ProbeKind::WpAdmin => self.has_wp_admin,
            ProbeKind::WpJson => self.has_wp_json,
            ProbeKind::JoomlaAdmin => self.has_joomla_admin,
            ProbeKind::DrupalAdmin => self.has_drupal_admin,
        }
    }
}

/// Static description of one candidate CMS.
#[derive(Debug, Clone)]
pub struct CmsIndicator {
    pub name: String,
    pub patterns: Vec<Regex>,
    /// `name` attribute of the meta tag expected to announce the CMS.
    pub meta: String,
    /// Admin paths whose reachability counts as evidence for this CMS.
    pub probes: Vec<ProbeKind>,
}

impl CmsIndicator {
    pub fn new(name: &str, patterns: &[&str], meta: &str) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ScanError::ParseError(format!("Bad pattern {:?}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            patterns,
            meta: meta.to_string(),
            probes: Vec::new(),
        })
    }

    pub fn with_probes(mut self, probes: &[ProbeKind]) -> Self {
        self.probes = probes.to_vec();
        self
    }

    fn matches_any(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

/// The default candidate set, in priority order.
pub fn default_indicators() -> Result<Vec<CmsIndicator>> {
    Ok(vec![
        CmsIndicator::new(
            "wordpress",
            &["wp-content", "wp-includes", "wp-admin", "wordpress", "wp-json"],
            "generator",
        )?
        .with_probes(&[ProbeKind::WpAdmin, ProbeKind::WpJson]),
        CmsIndicator::new("joomla", &["joomla", "joomla!"], "generator")?,
        CmsIndicator::new("drupal", &["drupal"], "generator")?,
        CmsIndicator::new("magento", &["magento"], "generator")?,
        CmsIndicator::new("shopify", &["shopify"], "generator")?,
    ])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateScore {
    pub cms: String,
    pub score: u32,
}

/// Read the `content` of `meta[name=<name>]`, if the page declares one.
pub fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[name="{}"]"#, name)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.to_string())
}

/// Score every candidate against a page. Order follows `indicators`.
pub fn score_candidates(
    html: &str,
    indicators: &[CmsIndicator],
    probes: &ProbeMap,
) -> Vec<CandidateScore> {
    let document = Html::parse_document(html);
    let mut meta_cache: HashMap<&str, Option<String>> = HashMap::new();

    indicators
        .iter()
        .map(|indicator| {
            let mut score = 0;

            for pattern in &indicator.patterns {
                if pattern.is_match(html) {
                    score += PATTERN_WEIGHT;
                }
            }

            let generator = meta_cache
                .entry(indicator.meta.as_str())
                .or_insert_with(|| meta_content(&document, &indicator.meta));
            if let Some(value) = generator.as_deref()
                && indicator.matches_any(value)
            {
                score += GENERATOR_WEIGHT;
            }

            for kind in &indicator.probes {
                if probes.get(*kind) {
                    score += PROBE_WEIGHT;
                }
            }

            CandidateScore {
                cms: indicator.name.clone(),
                score,
            }
        })
        .collect()
}

/// Pick the leader with a strict-greater running maximum.
pub fn select_leader(scores: &[CandidateScore]) -> (String, u32) {
    let mut detected = DetectionResult::UNKNOWN.to_string();
    let mut confidence = 0;

    for candidate in scores {
        if candidate.score > confidence {
            confidence = candidate.score;
            detected = candidate.cms.clone();
        }
    }

    (detected, confidence)
}

pub struct Fingerprinter {
    client: Client,
    prober: Prober,
    indicators: Vec<CmsIndicator>,
}

impl Fingerprinter {
    pub fn new() -> Result<Self> {
        Self::with_timeouts(DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_PROBE_TIMEOUT_SECS)
    }

    pub fn with_timeouts(fetch_timeout_secs: u64, probe_timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .timeout(Duration::from_secs(fetch_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            prober: Prober::with_timeout(probe_timeout_secs)?,
            indicators: default_indicators()?,
        })
    }

    pub fn with_indicators(mut self, indicators: Vec<CmsIndicator>) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn indicators(&self) -> &[CmsIndicator] {
        &self.indicators
    }

    /// Fetch `url`, probe its admin paths and score every candidate.
    ///
    /// A failed initial fetch (including a non-success status) aborts detection.
    pub async fn detect(&self, url: &str) -> Result<DetectionResult> {
        Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        info!("Detecting CMS for {}", url);

        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let probes = self.prober.probe_admin_paths(url).await;
        debug!("Probe results for {}: {:?}", url, probes);

        let scores = score_candidates(&html, &self.indicators, &probes);
        for candidate in &scores {
            debug!("  {} scored {}", candidate.cms, candidate.score);
        }
        let (cms, confidence) = select_leader(&scores);

        info!("Detected {} (confidence {}) on {}", cms, confidence, url);
        Ok(DetectionResult {
            cms,
            confidence,
            url: url.to_string(),
            probes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const WORDPRESS_HTML: &str = r#"<html><head>
        <meta name="generator" content="WordPress 6.2">
        <link rel="stylesheet" href="/wp-content/themes/twentytwenty/style.css">
        <script src="/wp-includes/js/jquery.js"></script>
        </head><body>Hello</body></html>"#;

    fn score_of(scores: &[CandidateScore], cms: &str) -> u32 {
        scores.iter().find(|c| c.cms == cms).map(|c| c.score).unwrap()
    }

    #[test]
    fn test_wordpress_scoring_with_probes() {
        let indicators = default_indicators().unwrap();
        let probes = ProbeMap {
            has_wp_admin: true,
            has_wp_json: true,
            ..Default::default()
        };

        let scores = score_candidates(WORDPRESS_HTML, &indicators, &probes);
        // wp-content, wp-includes and "wordpress" in the raw HTML, the generator tag, two probes
        assert_eq!(score_of(&scores, "wordpress"), 2 + 2 + 2 + 3 + 2 + 2);

        let (cms, confidence) = select_leader(&scores);
        assert_eq!(cms, "wordpress");
        assert!(confidence >= 11);
    }

    #[test]
    fn test_no_evidence_is_unknown() {
        let indicators = default_indicators().unwrap();
        let scores = score_candidates(
            "<html><head><title>Plain</title></head><body>Static site</body></html>",
            &indicators,
            &ProbeMap::default(),
        );

        assert!(scores.iter().all(|c| c.score == 0));
        assert_eq!(select_leader(&scores), ("Unknown".to_string(), 0));
    }

    #[test]
    fn test_probes_only_count_for_their_candidate() {
        let indicators = default_indicators().unwrap();
        let probes = ProbeMap {
            has_joomla_admin: true,
            has_drupal_admin: true,
            ..Default::default()
        };

        let scores = score_candidates("<html></html>", &indicators, &probes);
        assert!(scores.iter().all(|c| c.score == 0));
    }

    #[test]
    fn test_generator_meta_adds_three() {
        let indicators = default_indicators().unwrap();
        let html = r#"<html><head><meta name="generator" content="Drupal 10"></head></html>"#;

        let scores = score_candidates(html, &indicators, &ProbeMap::default());
        // "drupal" in the raw HTML plus the generator match
        assert_eq!(score_of(&scores, "drupal"), 5);
        assert_eq!(select_leader(&scores), ("drupal".to_string(), 5));
    }

    #[test]
    fn test_ties_go_to_the_earlier_candidate() {
        let indicators = default_indicators().unwrap();
        let html = "<html><body>Powered by Drupal, ported from Magento</body></html>";

        let scores = score_candidates(html, &indicators, &ProbeMap::default());
        assert_eq!(score_of(&scores, "drupal"), 2);
        assert_eq!(score_of(&scores, "magento"), 2);
        assert_eq!(select_leader(&scores), ("drupal".to_string(), 2));
    }

    #[test]
    fn test_scoring_is_monotonic_in_patterns() {
        let html = "<html><body>Built with Shopify, cdn.shopify.com assets</body></html>";
        let probes = ProbeMap::default();

        let narrow = vec![CmsIndicator::new("shopify", &["shopify"], "generator").unwrap()];
        let wide = vec![
            CmsIndicator::new("shopify", &["shopify", "cdn\\.shopify\\.com"], "generator").unwrap(),
        ];
        let unrelated = vec![
            CmsIndicator::new("shopify", &["shopify", "never-present"], "generator").unwrap(),
        ];

        let base = score_candidates(html, &narrow, &probes)[0].score;
        assert!(score_candidates(html, &wide, &probes)[0].score >= base);
        assert!(score_candidates(html, &unrelated, &probes)[0].score >= base);
    }

    #[test]
    fn test_meta_content_missing() {
        let document = Html::parse_document("<html><head></head></html>");
        assert_eq!(meta_content(&document, "generator"), None);
    }

    #[tokio::test]
    async fn test_detect_wordpress_site() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(WORDPRESS_HTML),
            )
            .mount(&mock_server)
            .await;
        for route in ["/wp-admin", "/wp-json"] {
            Mock::given(method("HEAD"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200))
                .mount(&mock_server)
                .await;
        }

        let fingerprinter = Fingerprinter::new().unwrap();
        let result = fingerprinter.detect(&mock_server.uri()).await.unwrap();

        assert_eq!(result.cms, "wordpress");
        assert!(result.confidence >= 11);
        assert_eq!(result.url, mock_server.uri());
        assert!(result.probes.has_wp_admin);
        assert!(result.probes.has_wp_json);
        assert!(!result.probes.has_joomla_admin);
        assert!(!result.probes.has_drupal_admin);
    }

    #[tokio::test]
    async fn test_detect_unknown_site() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body>Hand written</body></html>"),
            )
            .mount(&mock_server)
            .await;

        let fingerprinter = Fingerprinter::new().unwrap();
        let result = fingerprinter.detect(&mock_server.uri()).await.unwrap();

        assert!(result.is_unknown());
        assert_eq!(result.confidence, 0);
    }

    #[tokio::test]
    async fn test_detect_aborts_when_page_fetch_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let fingerprinter = Fingerprinter::new().unwrap();
        let result = fingerprinter.detect(&mock_server.uri()).await;

        assert!(matches!(result, Err(ScanError::HttpError(_))));
    }

    #[tokio::test]
    async fn test_detect_rejects_invalid_url() {
        let fingerprinter = Fingerprinter::new().unwrap();
        let result = fingerprinter.detect("not a url").await;
        assert!(matches!(result, Err(ScanError::InvalidUrl(_))));
    }
}
