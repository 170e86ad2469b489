//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the mirror proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Public origin of the proxy as seen by clients (e.g. "https://mirror.example").
    /// When unset, the origin is derived per request from the Host header.
    pub public_origin: Option<String>,

    /// Serve the built-in landing page on `/` instead of routing it upstream.
    pub homepage: bool,

    /// Category routes, keyed by path prefix.
    pub routes: Vec<RouteConfig>,

    /// Route used when no prefix matches. Its prefix is ignored.
    pub default_route: RouteConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Markup injected by the HTML rewrite engine.
    pub seo: SeoConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            public_origin: None,
            homepage: true,
            routes: vec![
                RouteConfig::category("anime", "/anime", "https://ww1.anoboy.app"),
                RouteConfig {
                    // Redirects from this upstream point at throwaway mirror
                    // domains; the Location is dropped instead of rewritten.
                    suppress_redirects: true,
                    inject_iframe_script: true,
                    ..RouteConfig::category("movies", "/movies", "https://tv4.lk21official.cc")
                },
            ],
            default_route: RouteConfig::category("default", "", "https://www.example.com"),
            timeouts: TimeoutConfig::default(),
            retries: RetryConfig::default(),
            security: SecurityConfig::default(),
            seo: SeoConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A path prefix mapped onto an upstream site.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics. Also selects the
    /// `<NAME>_TARGET_URL` environment override.
    pub name: String,

    /// Path prefix to match, without trailing slash (e.g. "/anime").
    #[serde(default)]
    pub prefix: String,

    /// Upstream base URL.
    pub upstream: String,

    /// CSS selectors removed from upstream HTML. `None` uses the built-in list.
    #[serde(default)]
    pub strip_selectors: Option<Vec<String>>,

    /// Inline scripts containing any of these strings are removed.
    #[serde(default = "default_script_needles")]
    pub strip_script_needles: Vec<String>,

    /// Send `Origin`/`Referer` pointing at the upstream.
    #[serde(default = "default_true")]
    pub spoof_origin: bool,

    /// Drop `Location` from upstream redirects instead of rewriting it.
    #[serde(default)]
    pub suppress_redirects: bool,

    /// Inject the iframe shim that re-targets embeds through `/proxy`.
    #[serde(default)]
    pub inject_iframe_script: bool,
}

impl RouteConfig {
    /// A category route with default policy flags.
    pub fn category(name: &str, prefix: &str, upstream: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            upstream: upstream.to_string(),
            strip_selectors: None,
            strip_script_needles: default_script_needles(),
            spoof_origin: true,
            suppress_redirects: false,
            inject_iframe_script: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_script_needles() -> Vec<String> {
    vec!["adsbygoogle".to_string()]
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to produce response headers, and
    /// separately to deliver a buffered HTML body, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Retry configuration. Only connection failures and timeouts of
/// idempotent requests are retried.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Defaults used when completing page metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SeoConfig {
    /// Content of the injected `keywords` meta tag.
    pub keywords: String,

    /// Content of the injected `description` meta tag.
    pub description: String,

    /// Descriptions shorter than this (in characters) are replaced.
    pub min_description_len: usize,

    /// Headline used when the page has no `<title>`.
    pub default_headline: String,

    /// Author used when the page has no `author` meta tag.
    pub default_author: String,

    /// Publisher name in the synthesized Article block.
    pub publisher_name: String,

    /// User-Agent sent upstream when the client supplied none.
    pub user_agent: String,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            keywords: "anime, movies, streaming, subtitle indonesia".to_string(),
            description: "Watch the latest anime and movies with Indonesian subtitles, updated daily.".to_string(),
            min_description_len: 50,
            default_headline: "Article".to_string(),
            default_author: "Content Source".to_string(),
            publisher_name: "Mirror Proxy".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
