//! Redirect rewriting.
//!
//! # Responsibilities
//! - Resolve an upstream `Location` against the URL that produced it
//! - Keep same-target redirects inside the proxy (route prefix or endpoint)
//! - Pass foreign redirects through, absolutizing relative ones
//! - Honor per-route redirect suppression
//!
//! # Design Decisions
//! - Stateless: every redirect is handled on its own
//! - A redirect status without `Location` is an error, never a pass-through
//! - A `Location` that cannot be resolved is forwarded as received

use axum::http::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, LOCATION};
use url::Url;

use crate::error::ProxyError;
use crate::rewrite::urls::{classify, Mount, RewriteContext, UrlClass};

/// What happens to one upstream `Location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Points back into the proxy.
    Rewritten(String),
    /// Foreign target, forwarded (absolute) as-is.
    PassThrough(String),
    /// Route policy hides the target; no `Location` is sent.
    Suppressed,
}

impl RedirectOutcome {
    pub fn location(&self) -> Option<&str> {
        match self {
            RedirectOutcome::Rewritten(l) | RedirectOutcome::PassThrough(l) => Some(l),
            RedirectOutcome::Suppressed => None,
        }
    }
}

/// Decide the client-facing `Location` for an upstream redirect.
pub fn rewrite_location(location: &str, ctx: &RewriteContext<'_>) -> RedirectOutcome {
    if ctx.route.policy.suppress_redirects {
        tracing::debug!(route = %ctx.route.name, location = %location, "Redirect suppressed");
        return RedirectOutcome::Suppressed;
    }

    let class = match classify(location, &ctx.upstream_url, ctx.route) {
        Some(class) => class,
        None => {
            tracing::warn!(location = %location, "Unresolvable Location forwarded unchanged");
            return RedirectOutcome::PassThrough(location.to_string());
        }
    };

    match (class, &ctx.mount) {
        (UrlClass::Skip, _) => RedirectOutcome::PassThrough(location.to_string()),
        (UrlClass::SameTarget(resolved), _) => RedirectOutcome::Rewritten(ctx.proxied(&resolved).to_string()),
        (UrlClass::Foreign { resolved, .. }, Mount::Endpoint) => {
            RedirectOutcome::Rewritten(ctx.proxied(&resolved).to_string())
        }
        (UrlClass::Foreign { relative: true, .. }, Mount::Prefix(_)) => {
            match ctx.canonical_origin().join(location.trim()) {
                Ok(absolute) => RedirectOutcome::PassThrough(absolute.to_string()),
                Err(_) => RedirectOutcome::PassThrough(location.to_string()),
            }
        }
        (UrlClass::Foreign { relative: false, .. }, Mount::Prefix(_)) => {
            RedirectOutcome::PassThrough(location.to_string())
        }
    }
}

/// `location` resolved against `base`, or as received when it cannot be.
pub fn absolute_location(location: &str, base: &Url) -> String {
    base.join(location.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}

/// Headers for the client-facing redirect: upstream headers minus
/// `content-encoding`, `content-length` and `location`, plus the computed
/// `Location` when there is one.
pub fn redirect_headers(
    status: u16,
    upstream: &HeaderMap,
    ctx: &RewriteContext<'_>,
) -> Result<(HeaderMap, RedirectOutcome), ProxyError> {
    let location = upstream
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ProxyError::MalformedRedirect(status))?;

    let outcome = rewrite_location(location, ctx);
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream.iter() {
        if name == CONTENT_ENCODING || name == CONTENT_LENGTH || name == LOCATION {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(location) = outcome.location() {
        match HeaderValue::from_str(location) {
            Ok(value) => {
                headers.insert(LOCATION, value);
            }
            Err(_) => {
                tracing::warn!(location = %location, "Rewritten Location is not a valid header value");
            }
        }
    }

    tracing::debug!(status, ?outcome, "Redirect rewritten");
    Ok((headers, outcome))
}
