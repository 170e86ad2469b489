//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Map an elapsed deadline to `ProxyError::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The connect timeout lives on the HTTP client; this covers the rest
//! - Timed-out requests are fetch failures (500), like any network error

use std::future::Future;
use std::time::Duration;

use crate::error::ProxyError;

/// Await `fut`, failing with `ProxyError::Timeout` once `limit` elapses.
pub async fn with_timeout<T, Fut>(limit: Duration, fut: Fut) -> Result<T, ProxyError>
where
    Fut: Future<Output = Result<T, ProxyError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProxyError::Timeout(limit)),
    }
}
