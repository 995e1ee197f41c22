use crate::error::Result;
use crate::result::ProbeMap;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

pub const WP_ADMIN_PATH: &str = "/wp-admin";
pub const WP_JSON_PATH: &str = "/wp-json";
pub const JOOMLA_ADMIN_PATH: &str = "/administrator";
pub const DRUPAL_ADMIN_PATH: &str = "/admin";

/// Lightweight HEAD-based reachability checks.
///
/// A probe is a pure boolean signal: a 403, a 404, a 500, a refused connection
/// and a timeout all read as "unreachable".
#[derive(Clone)]
pub struct Prober {
    client: Client,
}

impl Prober {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_PROBE_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    pub async fn exists(&self, url: &str) -> bool {
        let outcome = self
            .client
            .head(url)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match outcome {
            Ok(response) => {
                debug!("Probe {} -> {}", url, response.status());
                true
            }
            Err(e) => {
                debug!("Probe {} unreachable: {}", url, e);
                false
            }
        }
    }

    /// Probe the four characteristic admin paths under `base_url`, one request each.
    pub async fn probe_admin_paths(&self, base_url: &str) -> ProbeMap {
        ProbeMap {
            has_wp_admin: self.exists(&join_path(base_url, WP_ADMIN_PATH)).await,
            has_wp_json: self.exists(&join_path(base_url, WP_JSON_PATH)).await,
            has_joomla_admin: self.exists(&join_path(base_url, JOOMLA_ADMIN_PATH)).await,
            has_drupal_admin: self.exists(&join_path(base_url, DRUPAL_ADMIN_PATH)).await,
        }
    }
}

/// Append `path` to `base`, without doubling the separator.
pub fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[test]
    fn test_join_path_trims_separators() {
        assert_eq!(join_path("https://a.test", "/wp-admin"), "https://a.test/wp-admin");
        assert_eq!(join_path("https://a.test/", "/wp-admin"), "https://a.test/wp-admin");
        assert_eq!(join_path("https://a.test//", "admin"), "https://a.test/admin");
    }

    #[tokio::test]
    async fn test_probe_success_status_is_reachable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/wp-json"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let prober = Prober::new().unwrap();
        assert!(prober.exists(&format!("{}/wp-json", mock_server.uri())).await);
    }

    #[tokio::test]
    async fn test_probe_error_statuses_read_as_unreachable() {
        let mock_server = MockServer::start().await;
        for (route, status) in [("/forbidden", 403), ("/missing", 404), ("/broken", 500)] {
            Mock::given(method("HEAD"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(status))
                .mount(&mock_server)
                .await;
        }

        let prober = Prober::new().unwrap();
        for route in ["/forbidden", "/missing", "/broken"] {
            assert!(
                !prober.exists(&format!("{}{}", mock_server.uri(), route)).await,
                "{} should be unreachable",
                route
            );
        }
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_unreachable() {
        let prober = Prober::new().unwrap();
        // Port 9 (discard) is not listening on loopback in test environments.
        assert!(!prober.exists("http://127.0.0.1:9/wp-admin").await);
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unreachable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let prober = Prober::with_timeout(1).unwrap();
        assert!(!prober.exists(&format!("{}/slow", mock_server.uri())).await);
    }

    #[tokio::test]
    async fn test_probe_admin_paths() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/wp-admin"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/administrator"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let prober = Prober::new().unwrap();
        let probes = prober
            .probe_admin_paths(&format!("{}/", mock_server.uri()))
            .await;

        assert_eq!(
            probes,
            ProbeMap {
                has_wp_admin: true,
                has_wp_json: false,
                has_joomla_admin: true,
                has_drupal_admin: false,
            }
        );
    }
}
