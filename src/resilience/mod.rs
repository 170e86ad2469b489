//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce request deadline)
//!     → On failure: retries.rs (check if retryable, retry with backoff.rs)
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline
//! - Retries are opt-in and only for idempotent requests (GET, HEAD, etc.)

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{retry_budget, with_retries};
pub use timeouts::with_timeout;
