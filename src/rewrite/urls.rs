//! URL classification and rewriting shared by the redirect rewriter and the
//! HTML rewrite engine.
//!
//! A raw URL found in upstream output is resolved against the page it came
//! from and classified:
//!
//! - **same-target**: the route's upstream origin or one of its subdomains.
//!   Mounted back under the proxy (route prefix or `/proxy` endpoint).
//! - **foreign, absolute**: left exactly as written.
//! - **foreign, relative**: absolutized against the canonical origin.
//!
//! Fragments, `mailto:`, `tel:` and `javascript:` values are never touched.

use url::Url;

use crate::config::SeoConfig;
use crate::routing::{apply_route_prefix, strip_route_prefix, Route};

/// Path of the generic proxy endpoint.
pub const ENDPOINT_PATH: &str = "/proxy";

const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:"];

/// Where same-target URLs are mounted on the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mount {
    /// Under the route prefix: `https://proxy/anime/ep/5`.
    Prefix(String),
    /// Through the generic endpoint: `https://proxy/proxy?type=html&url=…`.
    Endpoint,
}

/// Classification of one raw URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlClass {
    /// Never rewritten.
    Skip,
    SameTarget(Url),
    Foreign { resolved: Url, relative: bool },
}

/// True for values that must never be rewritten.
pub fn is_skipped(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return true;
    }
    SKIPPED_SCHEMES.iter().any(|scheme| {
        raw.get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    })
}

/// True when `raw` has no scheme and no authority of its own.
pub fn is_relative(raw: &str) -> bool {
    let raw = raw.trim();
    !raw.starts_with("//") && matches!(Url::parse(raw), Err(url::ParseError::RelativeUrlWithoutBase))
}

/// Resolve `raw` against `base` and classify it for `route`.
///
/// Returns `None` when the value cannot be resolved at all.
pub fn classify(raw: &str, base: &Url, route: &Route) -> Option<UrlClass> {
    if is_skipped(raw) {
        return Some(UrlClass::Skip);
    }
    let raw = raw.trim();
    let resolved = base.join(raw).ok()?;
    if route.owns(&resolved) {
        Some(UrlClass::SameTarget(resolved))
    } else {
        Some(UrlClass::Foreign {
            resolved,
            relative: is_relative(raw),
        })
    }
}

/// Read-only context for every rewrite of one response.
#[derive(Debug, Clone)]
pub struct RewriteContext<'a> {
    pub route: &'a Route,
    pub mount: Mount,
    /// URL of this page as the client sees it on the proxy.
    pub canonical_url: Url,
    /// URL the page was fetched from.
    pub upstream_url: Url,
    pub seo: &'a SeoConfig,
}

impl<'a> RewriteContext<'a> {
    /// Context for a page served under a route prefix.
    pub fn for_route(route: &'a Route, canonical_url: Url, upstream_url: Url, seo: &'a SeoConfig) -> Self {
        Self {
            mount: Mount::Prefix(route.prefix.clone()),
            route,
            canonical_url,
            upstream_url,
            seo,
        }
    }

    /// Context for a page served through the `/proxy` endpoint.
    pub fn for_endpoint(route: &'a Route, canonical_url: Url, upstream_url: Url, seo: &'a SeoConfig) -> Self {
        Self {
            mount: Mount::Endpoint,
            route,
            canonical_url,
            upstream_url,
            seo,
        }
    }

    /// The proxy's public origin with an empty path.
    pub fn canonical_origin(&self) -> Url {
        let mut origin = self.canonical_url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        origin
    }

    /// Proxy URL serving the same-target URL `resolved`.
    pub fn proxied(&self, resolved: &Url) -> Url {
        let mut out = self.canonical_origin();
        match &self.mount {
            Mount::Prefix(prefix) => {
                let residual = upstream_residual(&self.route.upstream, resolved.path());
                out.set_path(&apply_route_prefix(prefix, residual));
                out.set_query(resolved.query());
                out.set_fragment(resolved.fragment());
            }
            Mount::Endpoint => {
                out = endpoint_url(&out, resolved);
            }
        }
        if out.scheme() != "https" {
            if out.set_scheme("https").is_err() {
                tracing::debug!(url = %out, "Cannot force https on proxied URL");
            }
        }
        out
    }

    /// Rewrite a raw URL found relative to `base`.
    ///
    /// Returns `None` when the value must stay as written.
    pub fn rewrite_against(&self, raw: &str, base: &Url) -> Option<String> {
        let rewritten = match classify(raw, base, self.route) {
            None => {
                tracing::debug!(value = %raw, "Unresolvable URL left untouched");
                return None;
            }
            Some(UrlClass::Skip) => return None,
            Some(UrlClass::SameTarget(resolved)) => self.proxied(&resolved).to_string(),
            Some(UrlClass::Foreign { relative: true, .. }) => self.canonical_origin().join(raw.trim()).ok()?.to_string(),
            Some(UrlClass::Foreign { relative: false, .. }) => return None,
        };
        (rewritten != raw).then_some(rewritten)
    }

    /// Rewrite a raw URL found in the fetched page.
    pub fn rewrite(&self, raw: &str) -> Option<String> {
        self.rewrite_against(raw, &self.upstream_url)
    }
}

/// `<origin>/proxy?type=html&url=<target>`.
pub fn endpoint_url(origin: &Url, target: &Url) -> Url {
    let mut out = origin.clone();
    out.set_path(ENDPOINT_PATH);
    out.set_fragment(None);
    out.query_pairs_mut()
        .clear()
        .append_pair("type", "html")
        .append_pair("url", target.as_str());
    out
}

/// Path of `path` relative to the upstream base path. Paths outside the base
/// are kept whole.
fn upstream_residual<'p>(upstream: &Url, path: &'p str) -> &'p str {
    let base = upstream.path().trim_end_matches('/');
    if base.is_empty() {
        return path;
    }
    match strip_route_prefix(path, base) {
        Some("") => "/",
        Some(rest) => rest,
        None => path,
    }
}
