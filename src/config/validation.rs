//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Upstream URLs must be absolute http(s) URLs
//! - Route prefixes must be well-formed and unique
//! - Strip selectors must be understood by the HTML rewriter
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - A broken route is dropped (it answers 404); only errors that make the
//!   whole process unusable are fatal

use std::collections::HashSet;

use url::Url;

use crate::config::schema::{ProxyConfig, RouteConfig};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("route '{route}': invalid upstream URL {url:?}: {reason}")]
    InvalidUpstream {
        route: String,
        url: String,
        reason: String,
    },

    #[error("route '{route}': invalid prefix {prefix:?} (must start with '/' and not end with '/')")]
    InvalidPrefix { route: String, prefix: String },

    #[error("route '{route}': prefix {prefix:?} is already used")]
    DuplicatePrefix { route: String, prefix: String },

    #[error("route '{route}': unsupported selector {selector:?}")]
    InvalidSelector { route: String, selector: String },

    #[error("invalid public origin {0:?}")]
    InvalidPublicOrigin(String),

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

impl ValidationError {
    /// Fatal errors abort startup; the rest disable a single route or selector.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ValidationError::InvalidPublicOrigin(_) | ValidationError::InvalidBindAddress(_)
        )
    }
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config
        .listener
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(origin) = &config.public_origin {
        if parse_http_url(origin).is_err() {
            errors.push(ValidationError::InvalidPublicOrigin(origin.clone()));
        }
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if let Err(e) = validate_route(route) {
            errors.push(e);
            continue;
        }
        if !seen.insert(route.prefix.as_str()) {
            errors.push(ValidationError::DuplicatePrefix {
                route: route.name.clone(),
                prefix: route.prefix.clone(),
            });
        }
    }
    if let Err(e) = validate_upstream(&config.default_route) {
        errors.push(e);
    }

    for route in config.routes.iter().chain(std::iter::once(&config.default_route)) {
        for selector in route.strip_selectors.iter().flatten() {
            if !is_supported_selector(selector) {
                errors.push(ValidationError::InvalidSelector {
                    route: route.name.clone(),
                    selector: selector.clone(),
                });
            }
        }
    }

    errors
}

/// Validate a prefixed route and return its parsed upstream.
pub fn validate_route(route: &RouteConfig) -> Result<Url, ValidationError> {
    let prefix = &route.prefix;
    if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
        return Err(ValidationError::InvalidPrefix {
            route: route.name.clone(),
            prefix: prefix.clone(),
        });
    }
    validate_upstream(route)
}

/// Validate only the upstream URL of a route.
pub fn validate_upstream(route: &RouteConfig) -> Result<Url, ValidationError> {
    parse_http_url(&route.upstream).map_err(|reason| ValidationError::InvalidUpstream {
        route: route.name.clone(),
        url: route.upstream.clone(),
        reason,
    })
}

/// True when the HTML rewriter can compile `selector`.
pub fn is_supported_selector(selector: &str) -> bool {
    selector.parse::<lol_html::Selector>().is_ok()
}

fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url)
}
