use chrono::Local;
use cmscout_scanner::{CrawlNode, DetectionResult};
use colored::Colorize;
use url::Url;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

fn mark(found: bool) -> String {
    if found {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

/// Human-readable summary of a CMS detection.
pub fn generate_detection_report(result: &DetectionResult) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push_str("\n\n");
    report.push_str(&format!("# CMS detection: {}\n", result.url));
    report.push_str(&format!(
        "  Generated: {}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    let cms = if result.is_unknown() {
        result.cms.yellow().bold()
    } else {
        result.cms.green().bold()
    };
    report.push_str(&format!("  CMS:        {}\n", cms));
    report.push_str(&format!("  Confidence: {}\n\n", result.confidence));

    report.push_str("## Admin paths\n");
    let probes = &result.probes;
    report.push_str(&format!("  {} /wp-admin\n", mark(probes.has_wp_admin)));
    report.push_str(&format!("  {} /wp-json\n", mark(probes.has_wp_json)));
    report.push_str(&format!("  {} /administrator\n", mark(probes.has_joomla_admin)));
    report.push_str(&format!("  {} /admin\n", mark(probes.has_drupal_admin)));
    report.push('\n');

    report
}

/// Generate a crawl report from the crawl tree
pub fn generate_crawl_report(root: Option<&CrawlNode>) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push_str("\n\n");

    let Some(root) = root else {
        report.push_str("# Summary:\n");
        report.push_str("  The start page could not be loaded; nothing was crawled.\n");
        return report;
    };

    let pages = root.walk();
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages crawled: {}\n", pages.len()));

    let total_links: usize = pages.iter().map(|p| p.links.len()).sum();
    report.push_str(&format!("  Total links found: {}\n", total_links));

    let total_images: usize = pages.iter().map(|p| p.images.len()).sum();
    report.push_str(&format!("  Total images found: {}\n", total_images));

    let total_headings: usize = pages.iter().map(|p| p.headings.len()).sum();
    report.push_str(&format!("  Total headings found: {}\n", total_headings));

    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");

    let host = Url::parse(&root.page.url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| root.page.url.clone());
    report.push_str(&format!("## {}\n", host));
    push_node(&mut report, root, 1);
    report.push('\n');

    report
}

fn push_node(report: &mut String, node: &CrawlNode, indent: usize) {
    let path = extract_url_path(&node.page.url);
    let mut line = format!("{}{}", "  ".repeat(indent), path.bright_white());
    if !node.page.title.is_empty() {
        line.push_str(&format!(" {}", node.page.title.dimmed()));
    }
    report.push_str(&line);
    report.push('\n');

    for child in &node.sub_pages {
        push_node(report, child, indent + 1);
    }
}
