use cmscout_scanner::LinkScope;
use cmscout_scanner::browser::DEFAULT_NAVIGATION_TIMEOUT_SECS;
use cmscout_scanner::fingerprint::DEFAULT_FETCH_TIMEOUT_SECS;
use cmscout_scanner::probe::DEFAULT_PROBE_TIMEOUT_SECS;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_HOSTING_API_BASE: &str = "https://api.hostinger.com/v1";

pub const ENV_HOSTING_API_KEY: &str = "HOSTINGER_API_KEY";
pub const ENV_HOSTING_DOMAIN: &str = "HOSTINGER_DOMAIN";
pub const ENV_HOSTING_API_BASE: &str = "HOSTINGER_API_BASE";
pub const ENV_CHROME: &str = "CMSCOUT_CHROME";
pub const ENV_PROBE_TIMEOUT: &str = "CMSCOUT_PROBE_TIMEOUT";
pub const ENV_FETCH_TIMEOUT: &str = "CMSCOUT_FETCH_TIMEOUT";
pub const ENV_NAV_TIMEOUT: &str = "CMSCOUT_NAV_TIMEOUT";
pub const ENV_LINK_SCOPE: &str = "CMSCOUT_LINK_SCOPE";
pub const ENV_CRAWL_DOMAIN: &str = "CMSCOUT_CRAWL_DOMAIN";

/// Runtime settings, read from the environment and overridable from the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub hosting_api_key: Option<String>,
    pub hosting_domain: Option<String>,
    pub hosting_api_base: String,
    pub chrome_executable: Option<PathBuf>,
    pub probe_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub link_scope: LinkScope,
    /// Domain crawl links are scoped to; the start URL's host when unset.
    pub crawl_domain: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosting_api_key: None,
            hosting_domain: None,
            hosting_api_base: DEFAULT_HOSTING_API_BASE.to_string(),
            chrome_executable: None,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            link_scope: LinkScope::default(),
            crawl_domain: None,
        }
    }
}

impl Config {
    /// Process environment first, then a `.env` file in the working directory
    /// or one of its parents.
    pub fn from_env() -> Self {
        let file_vars = match dotenvy::dotenv_iter() {
            Ok(iter) => collect_env_file(iter, ".env"),
            Err(e) if e.not_found() => HashMap::new(),
            Err(e) => {
                warn!("Ignoring .env: {}", e);
                HashMap::new()
            }
        };
        Self::layered(file_vars)
    }

    /// Like [`Config::from_env`], with `path` as the fallback file. The process
    /// environment still wins over anything in the file.
    pub fn from_env_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file_vars = match dotenvy::from_path_iter(path) {
            Ok(iter) => collect_env_file(iter, &path.display().to_string()),
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                HashMap::new()
            }
        };
        Self::layered(file_vars)
    }

    fn layered(file_vars: HashMap<String, String>) -> Self {
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    /// Build a config from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Self {
            hosting_api_key: get(ENV_HOSTING_API_KEY),
            hosting_domain: get(ENV_HOSTING_DOMAIN),
            hosting_api_base: get(ENV_HOSTING_API_BASE)
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.hosting_api_base),
            chrome_executable: get(ENV_CHROME).map(PathBuf::from),
            probe_timeout_secs: parse_secs(ENV_PROBE_TIMEOUT, get(ENV_PROBE_TIMEOUT))
                .unwrap_or(defaults.probe_timeout_secs),
            fetch_timeout_secs: parse_secs(ENV_FETCH_TIMEOUT, get(ENV_FETCH_TIMEOUT))
                .unwrap_or(defaults.fetch_timeout_secs),
            navigation_timeout_secs: parse_secs(ENV_NAV_TIMEOUT, get(ENV_NAV_TIMEOUT))
                .unwrap_or(defaults.navigation_timeout_secs),
            link_scope: match get(ENV_LINK_SCOPE) {
                Some(raw) => raw.parse().unwrap_or_else(|e| {
                    warn!("Ignoring {}: {}", ENV_LINK_SCOPE, e);
                    defaults.link_scope
                }),
                None => defaults.link_scope,
            },
            crawl_domain: get(ENV_CRAWL_DOMAIN),
        }
    }
}

fn parse_secs(key: &str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            warn!("Ignoring {}={:?}: expected a positive number of seconds", key, raw);
            None
        }
    }
}

/// Read env-file pairs without touching the process environment.
fn collect_env_file<R: std::io::Read>(
    iter: dotenvy::Iter<R>,
    origin: &str,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => warn!("Skipping line in {}: {}", origin, e),
        }
    }
    debug!("Loaded {} entries from {}", vars.len(), origin);
    vars
}
