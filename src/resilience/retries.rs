//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a request is retryable (idempotent methods only)
//! - Determine if a failure is retryable (connect errors and timeouts only)
//! - Execute retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - Never retry POST/PUT/DELETE/PATCH (non-idempotent)
//! - HTTP status codes are never a reason to retry; upstream 5xx are forwarded
//! - Disabled unless `retries.enabled` is set

use std::future::Future;
use std::time::Duration;

use axum::http::Method;

use crate::config::RetryConfig;
use crate::error::ProxyError;
use crate::resilience::backoff::{backoff_for, max_backoff};

/// True for methods that may be sent more than once.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// True for failures that happened before the upstream produced a response.
pub fn is_retryable(error: &ProxyError) -> bool {
    match error {
        ProxyError::Timeout(_) => true,
        ProxyError::Fetch(e) => e.is_connect() || e.is_timeout(),
        _ => false,
    }
}

/// Number of attempts allowed for a request.
pub fn attempts_for(config: &RetryConfig, method: &Method) -> u32 {
    if config.enabled && is_idempotent(method) {
        config.max_attempts.max(1)
    } else {
        1
    }
}

/// Longest time `with_retries` can take when every attempt is bounded by
/// `per_attempt`: all attempts plus the largest possible backoff between them.
pub fn retry_budget(config: &RetryConfig, per_attempt: Duration) -> Duration {
    let attempts = attempts_for(config, &Method::GET);
    (1..attempts).fold(per_attempt * attempts, |total, attempt| {
        total + max_backoff(attempt, config.base_delay_ms, config.max_delay_ms)
    })
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is exhausted. The last error is returned.
pub async fn with_retries<T, F, Fut>(config: &RetryConfig, method: &Method, mut op: F) -> Result<T, ProxyError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProxyError>>,
{
    let max_attempts = attempts_for(config, method);
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts && is_retryable(&e) => {
                attempt += 1;
                let delay = backoff_for(config, attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Upstream attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
