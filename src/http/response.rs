//! Response composition.
//!
//! # Responsibilities
//! - Copy upstream headers minus framing and hop-by-hop headers
//! - Force `text/html; charset=utf-8` on rewritten HTML
//! - Stream non-HTML bodies without buffering
//! - Add CORS headers to every response
//!
//! # Design Decisions
//! - reqwest already decoded the body, so `content-encoding` never survives
//! - Multi-valued headers (e.g. `set-cookie`) are kept with `append`
//! - axum cannot carry a custom reason phrase; the canonical one is sent

use axum::{
    body::Body,
    http::{
        header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
        StatusCode,
    },
    response::Response,
};

use crate::http::cors::apply_cors;
use crate::upstream::UpstreamResponse;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// True when `name` must not be copied from upstream to the client.
fn is_dropped(name: &HeaderName, html: bool, suppress_location: bool) -> bool {
    *name == CONTENT_ENCODING
        || *name == CONTENT_LENGTH
        || HOP_BY_HOP.contains(&name.as_str())
        || (html && *name == CONTENT_TYPE)
        || (suppress_location && *name == LOCATION)
}

/// Client-facing headers for an upstream response.
pub fn compose_headers(upstream: &HeaderMap, html: bool, suppress_location: bool) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len() + 4);
    for (name, value) in upstream.iter() {
        if !is_dropped(name, html, suppress_location) {
            headers.append(name.clone(), value.clone());
        }
    }
    if html {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    }
    apply_cors(&mut headers);
    headers
}

fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Rewritten HTML page.
pub fn html_response(status: StatusCode, upstream: &HeaderMap, html: String, suppress_location: bool) -> Response {
    build(status, compose_headers(upstream, true, suppress_location), Body::from(html))
}

/// Non-HTML body streamed through as received.
pub fn passthrough_response(upstream: UpstreamResponse, suppress_location: bool) -> Response {
    let status = upstream.status;
    let headers = compose_headers(&upstream.headers, false, suppress_location);
    build(status, headers, upstream.into_body())
}

/// Redirect with already-rewritten headers and no body.
pub fn redirect_response(status: StatusCode, headers: HeaderMap) -> Response {
    build(status, compose_headers(&headers, false, false), Body::empty())
}

/// Page generated by the proxy itself.
pub fn static_html(html: String) -> Response {
    build(StatusCode::OK, compose_headers(&HeaderMap::new(), true, false), Body::from(html))
}
