use cmscout_core::report::*;
use cmscout_scanner::testing::page_with_links;
use cmscout_scanner::{CrawlNode, DetectionResult, ProbeMap};

#[test]
fn test_extract_url_path() {
    assert_eq!(extract_url_path("https://example.com/blog/post"), "/blog/post");
    assert_eq!(extract_url_path("https://example.com/"), "/");
    assert_eq!(extract_url_path("https://example.com"), "/");
    assert_eq!(extract_url_path("not a url"), "not a url");
}

#[test]
fn test_crawl_report_counts_and_tree() {
    let mut root = CrawlNode::leaf(page_with_links(
        "https://example.com/",
        &["https://example.com/about", "https://example.com/blog"],
    ));
    root.sub_pages.push(CrawlNode::leaf(page_with_links(
        "https://example.com/about",
        &["https://example.com/"],
    )));

    let report = generate_crawl_report(Some(&root));

    assert!(report.contains("Pages crawled: 2"));
    assert!(report.contains("Total links found: 3"));
    assert!(report.contains("example.com"));
    assert!(report.contains("/about"));
}

#[test]
fn test_crawl_report_without_root() {
    let report = generate_crawl_report(None);
    assert!(report.contains("nothing was crawled"));
    assert!(!report.contains("Pages crawled"));
}

#[test]
fn test_detection_report() {
    let result = DetectionResult {
        cms: "WordPress".to_string(),
        confidence: 13,
        url: "https://blog.example.com".to_string(),
        probes: ProbeMap {
            has_wp_admin: true,
            has_wp_json: true,
            ..Default::default()
        },
    };

    let report = generate_detection_report(&result);

    assert!(report.contains("https://blog.example.com"));
    assert!(report.contains("WordPress"));
    assert!(report.contains("Confidence: 13"));
    assert!(report.contains("/wp-json"));
    assert!(report.contains("/administrator"));
}
