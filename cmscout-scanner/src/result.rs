use serde::{Deserialize, Serialize};

/// Outcome of the characteristic admin-path probes run during detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeMap {
    pub has_wp_admin: bool,
    pub has_wp_json: bool,
    pub has_joomla_admin: bool,
    pub has_drupal_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub cms: String,
    pub confidence: u32,
    pub url: String,
    #[serde(rename = "analysis")]
    pub probes: ProbeMap,
}

impl DetectionResult {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn is_unknown(&self) -> bool {
        self.cms == Self::UNKNOWN
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub src: Option<String>,
    pub alt: Option<String>,
}

/// Structured view of one loaded page, read from the DOM in a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub meta_description: Option<String>,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub text_content: String,
    /// Navigation-menu links, only collected for `pages`/`all` extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<Link>>,
}

impl PageSnapshot {
    pub fn new(url: String) -> Self {
        Self {
            url,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlNode {
    #[serde(flatten)]
    pub page: PageSnapshot,
    pub sub_pages: Vec<CrawlNode>,
}

impl CrawlNode {
    pub fn leaf(page: PageSnapshot) -> Self {
        Self {
            page,
            sub_pages: Vec::new(),
        }
    }

    /// Number of pages in this subtree, including this node.
    pub fn page_count(&self) -> usize {
        1 + self.sub_pages.iter().map(CrawlNode::page_count).sum::<usize>()
    }

    /// Depth-first, document-order walk over every page in the tree.
    pub fn walk(&self) -> Vec<&PageSnapshot> {
        let mut pages = vec![&self.page];
        for child in &self.sub_pages {
            pages.extend(child.walk());
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_result_serializes_probes_as_analysis() {
        let result = DetectionResult {
            cms: "wordpress".to_string(),
            confidence: 11,
            url: "https://example.com".to_string(),
            probes: ProbeMap {
                has_wp_admin: true,
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["cms"], "wordpress");
        assert_eq!(json["analysis"]["has_wp_admin"], true);
        assert_eq!(json["analysis"]["has_drupal_admin"], false);
        assert!(json.get("probes").is_none());
    }

    #[test]
    fn test_snapshot_tolerates_null_fields_from_the_page() {
        let raw = serde_json::json!({
            "url": "https://example.com/",
            "title": "Home",
            "meta_description": null,
            "headings": [{"level": 1, "text": "Welcome"}],
            "links": [{"text": "About", "href": "/about"}],
            "images": [{"src": "/logo.png", "alt": null}],
            "text_content": "Welcome"
        });

        let snapshot: PageSnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snapshot.meta_description, None);
        assert_eq!(snapshot.images[0].alt, None);
        assert!(snapshot.pages.is_none());
    }

    #[test]
    fn test_crawl_node_flattens_page_and_counts_subtree() {
        let mut root = CrawlNode::leaf(PageSnapshot::new("https://a.test/".to_string()));
        let mut child = CrawlNode::leaf(PageSnapshot::new("https://a.test/b".to_string()));
        child
            .sub_pages
            .push(CrawlNode::leaf(PageSnapshot::new("https://a.test/c".to_string())));
        root.sub_pages.push(child);

        assert_eq!(root.page_count(), 3);
        let urls: Vec<&str> = root.walk().iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.test/", "https://a.test/b", "https://a.test/c"]);

        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["url"], "https://a.test/");
        assert_eq!(json["sub_pages"][0]["sub_pages"][0]["url"], "https://a.test/c");
        assert!(json.get("pages").is_none());
    }
}
