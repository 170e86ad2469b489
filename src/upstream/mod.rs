//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! UpstreamTarget + filtered headers + body
//!     → fetcher.rs (reqwest, manual redirects, deadlines, optional retry)
//!     → UpstreamResponse (status, headers, unread body)
//! ```

pub mod fetcher;

pub use fetcher::{Fetcher, UpstreamResponse};
