//! Service configuration
//!
//! Everything is read once from the environment in `main` and passed down
//! explicitly; nothing here is global.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_LIMIT: u32 = 20;
const DEFAULT_PORT: u16 = 8080;

/// Connection settings for the upstream chat service
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    /// Proxy URL applied to all upstream traffic (`ALL_PROXY`)
    pub proxy: Option<String>,
    /// Deadline for non-streaming calls. Streamed chat responses have none.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            proxy: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Top-level configuration for the relay service
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub upstream: UpstreamConfig,
    /// Page size used when walking message history
    pub history_page_limit: u32,
    pub port: u16,
    /// Allowed CORS origins; `None` allows any origin
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            history_page_limit: DEFAULT_PAGE_LIMIT,
            port: DEFAULT_PORT,
            allowed_origins: None,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (used by tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let upstream = UpstreamConfig {
            base_url: non_empty("UPSTREAM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: non_empty("UPSTREAM_API_KEY").unwrap_or_default(),
            proxy: non_empty("ALL_PROXY"),
            request_timeout: Duration::from_secs(parse_or(
                "UPSTREAM_TIMEOUT_SECS",
                non_empty("UPSTREAM_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            connect_timeout: Duration::from_secs(parse_or(
                "UPSTREAM_CONNECT_TIMEOUT_SECS",
                non_empty("UPSTREAM_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
        };

        let history_page_limit = parse_or(
            "HISTORY_PAGE_LIMIT",
            non_empty("HISTORY_PAGE_LIMIT"),
            DEFAULT_PAGE_LIMIT,
        )
        .max(1);

        let allowed_origins = non_empty("RELAY_ALLOWED_ORIGINS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        });

        Self {
            upstream,
            history_page_limit,
            port: parse_or("RELAY_PORT", non_empty("RELAY_PORT"), DEFAULT_PORT),
            allowed_origins,
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Ignoring unparseable config value");
            default
        }),
    }
}
