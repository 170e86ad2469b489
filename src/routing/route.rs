//! Route values and their policies.

use std::fmt;

use url::Url;

use crate::config::validation::{is_supported_selector, validate_upstream, ValidationError};
use crate::config::RouteConfig;

/// Selectors removed from category pages when the route configures none.
pub const DEFAULT_STRIP_SELECTORS: &[&str] = &[
    ".ads",
    ".advertisement",
    ".banner",
    ".iklan",
    "#coloma",
    ".sidebar a",
    "#ad_box",
    "#ad_bawah",
    "#judi",
    "#judi2",
    r#"iframe[src*="ad"]"#,
    r#"iframe[src*="banner"]"#,
    r#"script[src*="ad"]"#,
    r#"script[src*="analytics"]"#,
    r#"script[src*="googletagmanager"]"#,
    r#"script[src*="doubleclick"]"#,
    "div[data-ad-client]",
    "div[data-ad-slot]",
    r#"link[rel="dns-prefetch"]"#,
    r#"link[rel="shortlink"]"#,
];

/// What kind of content a route serves. Every policy decision branches on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteTag {
    /// Built-in pages served by the proxy itself.
    Static,
    /// Third-party content passed through without classification.
    GenericProxy,
    /// A known upstream site mounted under a prefix.
    Category(String),
}

impl RouteTag {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &str {
        match self {
            RouteTag::Static => "static",
            RouteTag::GenericProxy => "proxy",
            RouteTag::Category(name) => name,
        }
    }
}

impl fmt::Display for RouteTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-route switches consulted by the header filter, the redirect
/// rewriter and the HTML rewrite engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Selectors removed from HTML (ignored unless the tag is `Category`).
    pub strip_selectors: Vec<String>,
    /// Inline scripts containing any of these are removed.
    pub strip_script_needles: Vec<String>,
    pub spoof_origin: bool,
    pub suppress_redirects: bool,
    pub inject_iframe_script: bool,
}

/// A path prefix mapped onto an upstream base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    /// Empty for the default route.
    pub prefix: String,
    pub upstream: Url,
    pub tag: RouteTag,
    pub policy: RoutePolicy,
}

impl Route {
    /// Build a route from its (already prefix-checked) configuration.
    pub fn from_config(config: &RouteConfig, tag: RouteTag) -> Result<Self, ValidationError> {
        let upstream = validate_upstream(config)?;
        let strip_selectors = match &config.strip_selectors {
            Some(selectors) => selectors
                .iter()
                .filter(|s| is_supported_selector(s))
                .cloned()
                .collect(),
            None => DEFAULT_STRIP_SELECTORS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            name: config.name.clone(),
            prefix: config.prefix.trim_end_matches('/').to_string(),
            upstream,
            tag,
            policy: RoutePolicy {
                strip_selectors,
                strip_script_needles: config.strip_script_needles.clone(),
                spoof_origin: config.spoof_origin,
                suppress_redirects: config.suppress_redirects,
                inject_iframe_script: config.inject_iframe_script,
            },
        })
    }

    /// Ad-hoc route for the `/proxy?url=` endpoint, rooted at `target`.
    pub fn endpoint(target: &Url) -> Self {
        Self {
            name: "proxy".to_string(),
            prefix: String::new(),
            upstream: target.clone(),
            tag: RouteTag::GenericProxy,
            policy: RoutePolicy {
                spoof_origin: true,
                inject_iframe_script: true,
                ..RoutePolicy::default()
            },
        }
    }

    /// Absolute upstream URL for a residual path and optional query.
    pub fn target(&self, residual_path: &str, query: Option<&str>) -> Result<UpstreamTarget, url::ParseError> {
        let base = self.upstream.as_str().trim_end_matches('/');
        let path = if residual_path.starts_with('/') {
            residual_path.to_string()
        } else {
            format!("/{}", residual_path)
        };
        let raw = match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", base, path, q),
            _ => format!("{}{}", base, path),
        };
        Ok(UpstreamTarget {
            url: Url::parse(&raw)?,
            tag: self.tag.clone(),
        })
    }

    /// True when `url` belongs to this route's upstream: same origin, or the
    /// upstream host (or one of its subdomains) under either http or https.
    pub fn owns(&self, url: &Url) -> bool {
        if url.origin() == self.upstream.origin() {
            return true;
        }
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        match (url.host_str(), self.upstream.host_str()) {
            (Some(host), Some(upstream_host)) => host
                .strip_suffix(upstream_host)
                .is_some_and(|rest| rest.is_empty() || rest.ends_with('.')),
            _ => false,
        }
    }
}

/// The absolute URL actually fetched for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub url: Url,
    pub tag: RouteTag,
}
