//! Request-level error taxonomy.
//!
//! Failures local to one rewrite stage or one attribute are not represented
//! here: they are logged and the affected markup is left as it was.

use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::cors::apply_cors;

/// Errors that abort a proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The matched route cannot produce a valid upstream URL.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network, DNS or protocol failure reaching the upstream.
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The upstream did not answer within the deadline.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// A redirect status arrived without a `Location` header.
    #[error("upstream returned {0} without a Location header")]
    MalformedRedirect(u16),

    /// No route matches and the default route is disabled.
    #[error("no route for {0}")]
    RouteNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Configuration(_)
            | ProxyError::Fetch(_)
            | ProxyError::Timeout(_)
            | ProxyError::MalformedRedirect(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Body shown to the client. Server-side details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ProxyError::BadRequest(msg) => msg.clone(),
            other => other
                .status()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.public_message()).into_response();
        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        apply_cors(headers);
        response
    }
}
