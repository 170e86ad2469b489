//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → RequestBodyLimitLayer (server.rs, size cap)
//!     → headers.rs (drop hop-by-hop, credentials, client identity)
//!     → Pass to upstream fetcher
//! ```
//!
//! # Design Decisions
//! - Nothing that identifies the client is forwarded upstream
//! - No trust in client input

pub mod headers;

pub use headers::{filter_request_headers, spoof_origin};
