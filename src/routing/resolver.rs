//! Route lookup.
//!
//! # Responsibilities
//! - Store validated routes, longest prefix first
//! - Map a request path to (route, residual path)
//! - Fall back to the default route when no prefix matches
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Prefixes only match on segment boundaries: "/anime" never matches "/animequiz"

use std::collections::HashSet;

use crate::config::validation::validate_route;
use crate::config::ProxyConfig;
use crate::routing::route::{Route, RouteTag, UpstreamTarget};

/// The outcome of resolving a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub route: &'a Route,
    /// Path with the route prefix removed; never empty.
    pub residual_path: &'a str,
}

impl Resolution<'_> {
    /// Upstream URL for this resolution plus the request query.
    pub fn target(&self, query: Option<&str>) -> Result<UpstreamTarget, url::ParseError> {
        self.route.target(self.residual_path, query)
    }
}

/// Immutable table of prefix routes plus the default route.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    default: Option<Route>,
}

impl RouteTable {
    /// Build a table from explicit routes. Routes with longer prefixes are
    /// checked first; equal lengths keep their given order.
    pub fn new(mut routes: Vec<Route>, default: Option<Route>) -> Self {
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes, default }
    }

    /// Build the table from configuration. Invalid routes are logged and left out.
    pub fn from_config(config: &ProxyConfig) -> Self {
        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(config.routes.len());

        for route_config in &config.routes {
            let built = validate_route(route_config).and_then(|_| {
                Route::from_config(route_config, RouteTag::Category(route_config.name.clone()))
            });
            match built {
                Ok(route) if seen.insert(route.prefix.clone()) => {
                    tracing::info!(
                        route = %route.name,
                        prefix = %route.prefix,
                        upstream = %route.upstream,
                        "Route registered"
                    );
                    routes.push(route);
                }
                Ok(route) => {
                    tracing::error!(route = %route.name, prefix = %route.prefix, "Duplicate prefix, route disabled");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Route disabled");
                }
            }
        }

        let default = match Route::from_config(&config.default_route, RouteTag::GenericProxy) {
            Ok(mut route) => {
                route.prefix.clear();
                tracing::info!(upstream = %route.upstream, "Default route registered");
                Some(route)
            }
            Err(e) => {
                tracing::error!(error = %e, "Default route disabled");
                None
            }
        };

        Self::new(routes, default)
    }

    /// Resolve a request path.
    ///
    /// Returns `None` only when nothing matches and the default route is disabled.
    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<Resolution<'a>> {
        for route in &self.routes {
            if let Some(rest) = strip_route_prefix(path, &route.prefix) {
                return Some(Resolution {
                    route,
                    residual_path: if rest.is_empty() { "/" } else { rest },
                });
            }
        }

        self.default.as_ref().map(|route| Resolution {
            route,
            residual_path: if path.is_empty() { "/" } else { path },
        })
    }

    /// Prefix routes, longest prefix first.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn default_route(&self) -> Option<&Route> {
        self.default.as_ref()
    }
}

/// Remove `prefix` from `path` if it ends on a segment boundary.
pub fn strip_route_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Inverse of [`strip_route_prefix`]: mount an upstream path under `prefix`.
pub fn apply_route_prefix(prefix: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{}{}", prefix, path)
    } else {
        format!("{}/{}", prefix, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn table() -> RouteTable {
        let mut config = ProxyConfig::default();
        config.routes.push(RouteConfig::category("anime-quiz", "/anime/quiz", "https://quiz.example"));
        config.default_route.upstream = "https://fallback.example".to_string();
        RouteTable::from_config(&config)
    }

    #[test]
    fn test_prefix_match_strips_prefix() {
        let table = table();
        let res = table.resolve("/anime/page/2/").unwrap();
        assert_eq!(res.route.name, "anime");
        assert_eq!(res.residual_path, "/page/2/");
        let target = res.target(Some("x=1")).unwrap();
        assert_eq!(target.url.as_str(), "https://ww1.anoboy.app/page/2/?x=1");
    }

    #[test]
    fn test_bare_prefix_normalizes_to_root() {
        let table = table();
        let res = table.resolve("/movies").unwrap();
        assert_eq!(res.route.name, "movies");
        assert_eq!(res.residual_path, "/");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table();
        let res = table.resolve("/anime/quiz/1").unwrap();
        assert_eq!(res.route.name, "anime-quiz");
        assert_eq!(res.residual_path, "/1");
    }

    #[test]
    fn test_prefix_requires_segment_boundary() {
        let table = table();
        let res = table.resolve("/animequiz").unwrap();
        assert_eq!(res.route.tag, RouteTag::GenericProxy);
        assert_eq!(res.residual_path, "/animequiz");
    }

    #[test]
    fn test_default_route_keeps_path() {
        let table = table();
        let res = table.resolve("/randompath").unwrap();
        assert_eq!(res.route.tag, RouteTag::GenericProxy);
        let target = res.target(None).unwrap();
        assert_eq!(target.url.as_str(), "https://fallback.example/randompath");
    }

    #[test]
    fn test_invalid_default_route_yields_none() {
        let mut config = ProxyConfig::default();
        config.default_route.upstream = "::".to_string();
        let table = RouteTable::from_config(&config);
        assert!(table.resolve("/nowhere").is_none());
        assert!(table.resolve("/anime/x").is_some());
    }

    #[test]
    fn test_strip_and_apply_are_symmetric() {
        for path in ["/anime/x/y", "/anime/", "/anime/a%20b/c"] {
            let rest = strip_route_prefix(path, "/anime").unwrap();
            assert_eq!(apply_route_prefix("/anime", rest), path);
        }
        let rest = strip_route_prefix("/anime", "/anime").unwrap();
        assert_eq!(apply_route_prefix("/anime", rest), "/anime/");
    }
}
