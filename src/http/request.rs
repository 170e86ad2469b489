//! Request inspection.
//!
//! # Responsibilities
//! - Read the request ID set by the request-id layer
//! - Derive the canonical URL of a request as the client sees it
//! - Buffer the request body for forwarding, within the size limit
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - The canonical origin is always https, whatever the inbound scheme

use axum::{
    body::{Body, Bytes},
    http::{header::HOST, HeaderMap, Uri},
};
use url::Url;

use crate::error::ProxyError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID, or `"unknown"` when the layer did not set one.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Absolute URL of this request on the proxy.
///
/// Uses the configured public origin when set, otherwise the `Host` header
/// (falling back to the URI authority, then `localhost`).
pub fn canonical_url(public_origin: Option<&Url>, headers: &HeaderMap, uri: &Uri) -> Result<Url, ProxyError> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let origin = match public_origin {
        Some(origin) => origin.origin().ascii_serialization(),
        None => {
            let host = headers
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .or_else(|| uri.authority().map(|a| a.to_string()))
                .unwrap_or_else(|| "localhost".to_string());
            format!("https://{}", host)
        }
    };

    let mut url = Url::parse(&format!("{}{}", origin, path_and_query))
        .map_err(|e| ProxyError::BadRequest(format!("cannot build request URL: {}", e)))?;
    if url.scheme() != "https" {
        if url.set_scheme("https").is_err() {
            tracing::debug!(url = %url, "Cannot force https on canonical URL");
        }
    }
    Ok(url)
}

/// Read the whole request body, failing once it exceeds `limit` bytes.
pub async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ProxyError::PayloadTooLarge(limit))
}
