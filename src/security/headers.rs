//! Request header filtering.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers before forwarding upstream
//! - Strip headers that identify the client (cookies, credentials, client IP)
//! - Strip framing headers the upstream client recomputes
//! - Optionally present the request as same-origin to the upstream
//!
//! # Design Decisions
//! - Pure transform: input map is never mutated
//! - Order and multiplicity of surviving headers are preserved
//! - `HeaderName`s are stored lowercase, so matching is case-insensitive

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use url::Url;

/// Headers never forwarded upstream.
pub const FORBIDDEN_REQUEST_HEADERS: &[&str] = &[
    // hop-by-hop
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "proxy-authenticate",
    "te",
    "trailer",
    "upgrade",
    // credentials
    "cookie",
    "authorization",
    // client identity
    "forwarded",
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-real-ip",
    "true-client-ip",
    "cf-connecting-ip",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "x-vercel-forwarded-for",
    "x-nf-client-connection-ip",
    // recomputed by the upstream client
    "content-length",
    "transfer-encoding",
    "accept-encoding",
];

/// Header name prefixes never forwarded upstream.
pub const FORBIDDEN_REQUEST_PREFIXES: &[&str] = &["x-vercel-ip-", "x-nf-geo"];

/// True when `name` must not reach the upstream.
pub fn is_forbidden(name: &HeaderName) -> bool {
    let name = name.as_str();
    FORBIDDEN_REQUEST_HEADERS.contains(&name)
        || FORBIDDEN_REQUEST_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Copy `headers`, dropping every forbidden header.
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if !is_forbidden(name) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// Make the request look like it originated on the upstream site:
/// `Origin` becomes the target's origin and `Referer` the target itself.
pub fn spoof_origin(headers: &mut HeaderMap, target: &Url) {
    let origin = target.origin().ascii_serialization();
    match HeaderValue::from_str(&origin) {
        Ok(value) => {
            headers.insert(ORIGIN, value);
        }
        Err(_) => {
            headers.remove(ORIGIN);
        }
    }
    match HeaderValue::from_str(target.as_str()) {
        Ok(value) => {
            headers.insert(REFERER, value);
        }
        Err(_) => {
            headers.remove(REFERER);
        }
    }
}
