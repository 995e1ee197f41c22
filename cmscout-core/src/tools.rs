//! Tool dispatch.
//!
//! Every tool returns a tagged [`ToolOutcome`]; it is flattened to text only by
//! [`render_outcome`], at the protocol or CLI boundary.

use crate::api::{DEFAULT_WP_ENDPOINT, HostingAction, HostingClient, WordPressClient};
use crate::config::Config;
use crate::error::{Result, ToolError};
use cmscout_scanner::crawler::DEFAULT_CRAWL_DEPTH;
use cmscout_scanner::{
    BrowserEngine, BrowserIdentity, ChromiumEngine, ContentType, Crawler, Fingerprinter, LinkScope,
    PageExtractor, extract_content,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub const DETECT_CMS: &str = "detect_cms";
pub const EXTRACT_CONTENT: &str = "extract_content";
pub const CRAWL_SITE: &str = "crawl_site";
pub const WORDPRESS_API_CONNECT: &str = "wordpress_api_connect";
pub const HOSTINGER_API_CONNECT: &str = "hostinger_api_connect";

pub type ToolOutcome = Result<serde_json::Value>;

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    DetectCms {
        url: String,
    },
    ExtractContent {
        url: String,
        content_type: ContentType,
    },
    CrawlSite {
        url: String,
        depth: usize,
        bypass_protection: bool,
    },
    WordPressApi {
        url: String,
        endpoint: String,
    },
    HostingApi {
        action: HostingAction,
    },
}

#[derive(Deserialize)]
struct UrlArgs {
    url: String,
}

// Optional fields are `Option`s so an explicit `null` means the same as omitting them.
#[derive(Deserialize)]
struct ExtractArgs {
    url: String,
    #[serde(default)]
    content_type: Option<ContentType>,
}

#[derive(Deserialize)]
struct CrawlArgs {
    url: String,
    #[serde(default)]
    depth: Option<f64>,
    #[serde(default)]
    bypass_protection: Option<bool>,
}

#[derive(Deserialize)]
struct WordPressArgs {
    url: String,
    #[serde(default)]
    endpoint: Option<String>,
}

#[derive(Deserialize)]
struct HostingArgs {
    action: String,
}

/// Depth budgets only ever count down to zero, so a fractional budget behaves
/// like the next whole number: 1.5 still recurses once, 0.5 still visits the root.
fn depth_budget(depth: f64) -> Result<usize> {
    if !depth.is_finite() || depth < 0.0 {
        return Err(ToolError::Validation(format!(
            "depth must be a non-negative number, got {}",
            depth
        )));
    }
    Ok(depth.ceil() as usize)
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, arguments: &serde_json::Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::Validation(format!("{}: {}", tool, e)))
}

fn require_url(url: String) -> Result<String> {
    let url = url.trim().to_string();
    if url.is_empty() {
        return Err(ToolError::Validation("url must not be empty".to_string()));
    }
    Ok(url)
}

impl ToolCall {
    /// Validate raw protocol arguments for the tool called `name`.
    pub fn parse(name: &str, arguments: &serde_json::Value) -> Result<Self> {
        match name {
            DETECT_CMS => {
                let args: UrlArgs = parse_args(name, arguments)?;
                Ok(ToolCall::DetectCms {
                    url: require_url(args.url)?,
                })
            }
            EXTRACT_CONTENT => {
                let args: ExtractArgs = parse_args(name, arguments)?;
                Ok(ToolCall::ExtractContent {
                    url: require_url(args.url)?,
                    content_type: args.content_type.unwrap_or_default(),
                })
            }
            CRAWL_SITE => {
                let args: CrawlArgs = parse_args(name, arguments)?;
                let depth = match args.depth {
                    Some(depth) => depth_budget(depth)?,
                    None => DEFAULT_CRAWL_DEPTH,
                };
                Ok(ToolCall::CrawlSite {
                    url: require_url(args.url)?,
                    depth,
                    bypass_protection: args.bypass_protection.unwrap_or(true),
                })
            }
            WORDPRESS_API_CONNECT => {
                let args: WordPressArgs = parse_args(name, arguments)?;
                Ok(ToolCall::WordPressApi {
                    url: require_url(args.url)?,
                    endpoint: args
                        .endpoint
                        .unwrap_or_else(|| DEFAULT_WP_ENDPOINT.to_string()),
                })
            }
            HOSTINGER_API_CONNECT => {
                let args: HostingArgs = parse_args(name, arguments)?;
                Ok(ToolCall::HostingApi {
                    action: args.action.parse()?,
                })
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::DetectCms { .. } => DETECT_CMS,
            ToolCall::ExtractContent { .. } => EXTRACT_CONTENT,
            ToolCall::CrawlSite { .. } => CRAWL_SITE,
            ToolCall::WordPressApi { .. } => WORDPRESS_API_CONNECT,
            ToolCall::HostingApi { .. } => HOSTINGER_API_CONNECT,
        }
    }
}

/// Everything the tools need, built once per process.
pub struct Toolbox {
    fingerprinter: Fingerprinter,
    engine: Arc<dyn BrowserEngine>,
    wordpress: WordPressClient,
    hosting: HostingClient,
    navigation_timeout_secs: u64,
    link_scope: LinkScope,
    crawl_domain: Option<String>,
}

impl Toolbox {
    /// A toolbox driving headless Chromium.
    pub fn new(config: &Config) -> Result<Self> {
        let engine = ChromiumEngine::new()
            .with_executable(config.chrome_executable.clone())
            .with_request_timeout(config.navigation_timeout_secs);
        Self::with_engine(config, Arc::new(engine))
    }

    pub fn with_engine(config: &Config, engine: Arc<dyn BrowserEngine>) -> Result<Self> {
        Ok(Self {
            fingerprinter: Fingerprinter::with_timeouts(
                config.fetch_timeout_secs,
                config.probe_timeout_secs,
            )?,
            engine,
            wordpress: WordPressClient::new(config.fetch_timeout_secs)?,
            hosting: HostingClient::new(
                &config.hosting_api_base,
                config.hosting_api_key.clone(),
                config.hosting_domain.clone(),
                config.fetch_timeout_secs,
            )?,
            navigation_timeout_secs: config.navigation_timeout_secs,
            link_scope: config.link_scope,
            crawl_domain: config.crawl_domain.clone(),
        })
    }

    fn extractor(&self, bypass_protection: bool) -> PageExtractor {
        let identity = bypass_protection.then(BrowserIdentity::desktop);
        PageExtractor::new()
            .with_identity(identity)
            .with_navigation_timeout(self.navigation_timeout_secs)
    }

    /// Parse and run a raw protocol call.
    pub async fn dispatch(&self, name: &str, arguments: &serde_json::Value) -> ToolOutcome {
        let call = ToolCall::parse(name, arguments)?;
        self.call(call).await
    }

    pub async fn call(&self, call: ToolCall) -> ToolOutcome {
        info!("Running tool {}", call.name());
        match call {
            ToolCall::DetectCms { url } => {
                let result = self.fingerprinter.detect(&url).await?;
                serde_json::to_value(result).map_err(to_internal)
            }
            ToolCall::ExtractContent { url, content_type } => {
                let snapshot =
                    extract_content(self.engine.as_ref(), &self.extractor(true), &url, content_type)
                        .await?;
                serde_json::to_value(snapshot).map_err(to_internal)
            }
            ToolCall::CrawlSite {
                url,
                depth,
                bypass_protection,
            } => {
                let mut crawler =
                    Crawler::new(self.extractor(bypass_protection)).with_scope(self.link_scope);
                if let Some(domain) = &self.crawl_domain {
                    crawler = crawler.with_target_domain(domain.clone());
                }
                let root = crawler.crawl_site(self.engine.as_ref(), &url, depth).await?;
                serde_json::to_value(root).map_err(to_internal)
            }
            ToolCall::WordPressApi { url, endpoint } => {
                let response = self.wordpress.fetch(&url, &endpoint).await?;
                serde_json::to_value(response).map_err(to_internal)
            }
            ToolCall::HostingApi { action } => self.hosting.call(action).await,
        }
    }
}

fn to_internal(e: serde_json::Error) -> ToolError {
    ToolError::Scan(cmscout_scanner::ScanError::Other(format!(
        "Failed to serialize tool output: {}",
        e
    )))
}

/// Flatten an outcome into the single text payload a caller receives.
pub fn render_outcome(tool: &str, outcome: &ToolOutcome) -> String {
    match outcome {
        Ok(value) => serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            format!("Error while running tool {}: failed to render output: {}", tool, e)
        }),
        Err(e) => format!("Error while running tool {}: {}", tool, e),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: DETECT_CMS,
            description: "Detect the content-management system a site runs on",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "URL of the site to analyse"}
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: EXTRACT_CONTENT,
            description: "Extract structured content from a page with a headless browser",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "URL of the page"},
                    "content_type": {
                        "type": "string",
                        "enum": ContentType::VARIANTS,
                        "description": "Kind of content to extract",
                        "default": "all"
                    }
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: WORDPRESS_API_CONNECT,
            description: "Query the WordPress REST API of a site",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "URL of the WordPress site"},
                    "endpoint": {
                        "type": "string",
                        "description": "API endpoint (posts, pages, users, ...)",
                        "default": DEFAULT_WP_ENDPOINT
                    }
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: HOSTINGER_API_CONNECT,
            description: "Query the hosting provider API",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": HostingAction::VARIANTS,
                        "description": "Action to perform"
                    }
                },
                "required": ["action"]
            }),
        },
        ToolDefinition {
            name: CRAWL_SITE,
            description: "Recursively crawl a site with a headless browser",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "URL of the site"},
                    "depth": {
                        "type": "number",
                        "description": "Crawl depth (fractions round up)",
                        "default": DEFAULT_CRAWL_DEPTH
                    },
                    "bypass_protection": {
                        "type": "boolean",
                        "description": "Spoof a desktop browser identity",
                        "default": true
                    }
                },
                "required": ["url"]
            }),
        },
    ]
}
