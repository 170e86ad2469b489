//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Issue one upstream request per attempt with the filtered headers
//! - Forward the method and (buffered) body
//! - Never follow redirects, so 3xx responses reach the redirect rewriter
//! - Bound every call with connect and request deadlines
//!
//! # Design Decisions
//! - reqwest handles content decoding, so bodies handed on are identity-encoded
//! - Response bodies are either streamed (passthrough) or read once as text (HTML)
//! - Retries are delegated to `resilience` and are off by default

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{
        header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION, USER_AGENT},
        Method, StatusCode,
    },
};
use url::Url;

use crate::config::{ProxyConfig, RetryConfig};
use crate::error::ProxyError;
use crate::resilience::{with_retries, with_timeout};

/// Client for fetching upstream targets.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    request_timeout: Duration,
    retries: RetryConfig,
    user_agent: Option<HeaderValue>,
}

impl Fetcher {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;

        let user_agent = HeaderValue::from_str(&config.seo.user_agent).ok();
        if user_agent.is_none() {
            tracing::warn!(user_agent = %config.seo.user_agent, "Ignoring invalid default User-Agent");
        }

        Ok(Self {
            client,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            retries: config.retries.clone(),
            user_agent,
        })
    }

    /// Send `method target` with `headers` and `body` and wait for the
    /// response head. The body is left unread.
    pub async fn fetch(
        &self,
        target: &Url,
        method: &Method,
        mut headers: HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, ProxyError> {
        if !headers.contains_key(USER_AGENT) {
            if let Some(ua) = &self.user_agent {
                headers.insert(USER_AGENT, ua.clone());
            }
        }

        let response = with_retries(&self.retries, method, |attempt| {
            let mut request = self
                .client
                .request(method.clone(), target.clone())
                .headers(headers.clone());
            if !body.is_empty() {
                request = request.body(body.clone());
            }
            tracing::debug!(upstream = %target, method = %method, attempt, "Fetching upstream");
            with_timeout(self.request_timeout, async move {
                request.send().await.map_err(ProxyError::from)
            })
        })
        .await?;

        tracing::debug!(
            upstream = %target,
            status = response.status().as_u16(),
            "Upstream responded"
        );

        Ok(UpstreamResponse {
            status: response.status(),
            headers: response.headers().clone(),
            inner: response,
            body_timeout: self.request_timeout,
        })
    }
}

/// Upstream response head plus an unread body. Consumed exactly once.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    inner: reqwest::Response,
    body_timeout: Duration,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// True for `text/html` bodies (parameters ignored).
    pub fn is_html(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
    }

    /// True for redirect statuses that must carry a `Location`.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status.as_u16(), 301 | 302 | 303 | 307 | 308)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Read the whole body as text.
    pub async fn text(self) -> Result<String, ProxyError> {
        let inner = self.inner;
        with_timeout(self.body_timeout, async move {
            inner.text().await.map_err(ProxyError::from)
        })
        .await
    }

    /// Stream the body without buffering it.
    pub fn into_body(self) -> Body {
        Body::from_stream(self.inner.bytes_stream())
    }
}
