// Passthrough clients for the WordPress REST API and the hosting provider API.

use crate::error::{Result, ToolError};
use cmscout_scanner::DESKTOP_USER_AGENT;
use cmscout_scanner::probe::join_path;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_WP_ENDPOINT: &str = "posts";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordPressResponse {
    pub endpoint: String,
    pub url: String,
    pub data: serde_json::Value,
    pub total: Option<String>,
    pub total_pages: Option<String>,
}

pub struct WordPressClient {
    client: Client,
}

impl WordPressClient {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// `GET {site}/wp-json/wp/v2/{endpoint}`, with the collection totals from the headers.
    pub async fn fetch(&self, site_url: &str, endpoint: &str) -> Result<WordPressResponse> {
        let endpoint = endpoint.trim_matches('/');
        if endpoint.is_empty() {
            return Err(ToolError::Validation("endpoint must not be empty".to_string()));
        }
        let api_url = join_path(site_url, &format!("wp-json/wp/v2/{}", endpoint));
        info!("Querying WordPress API {}", api_url);

        let response = self.client.get(&api_url).send().await?.error_for_status()?;
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let total = header("x-wp-total");
        let total_pages = header("x-wp-totalpages");
        let data = response.json::<serde_json::Value>().await?;

        Ok(WordPressResponse {
            endpoint: endpoint.to_string(),
            url: api_url,
            data,
            total,
            total_pages,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingAction {
    ListDomains,
    GetDomainInfo,
    ListDatabases,
}

impl HostingAction {
    pub const VARIANTS: [&'static str; 3] = ["list_domains", "get_domain_info", "list_databases"];
}

impl FromStr for HostingAction {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "list_domains" => Ok(HostingAction::ListDomains),
            "get_domain_info" => Ok(HostingAction::GetDomainInfo),
            "list_databases" => Ok(HostingAction::ListDatabases),
            other => Err(ToolError::Validation(format!(
                "Unsupported action '{}', expected one of {}",
                other,
                Self::VARIANTS.join(", ")
            ))),
        }
    }
}

impl fmt::Display for HostingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostingAction::ListDomains => "list_domains",
            HostingAction::GetDomainInfo => "get_domain_info",
            HostingAction::ListDatabases => "list_databases",
        };
        f.write_str(name)
    }
}

pub struct HostingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    domain: Option<String>,
}

impl HostingClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        domain: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            domain,
        })
    }

    pub fn path_for(&self, action: HostingAction) -> Result<String> {
        match action {
            HostingAction::ListDomains => Ok("/domains".to_string()),
            HostingAction::ListDatabases => Ok("/databases".to_string()),
            HostingAction::GetDomainInfo => {
                let domain = self.domain.as_deref().ok_or_else(|| {
                    ToolError::Configuration(
                        "hosting domain is not configured (set HOSTINGER_DOMAIN)".to_string(),
                    )
                })?;
                Ok(format!("/domains/{}", domain))
            }
        }
    }

    pub async fn call(&self, action: HostingAction) -> Result<serde_json::Value> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ToolError::Configuration(
                "hosting API key is not configured (set HOSTINGER_API_KEY)".to_string(),
            )
        })?;
        let url = format!("{}{}", self.base_url, self.path_for(action)?);
        info!("Calling hosting API action {} ({})", action, url);

        let data = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;
        Ok(data)
    }
}
