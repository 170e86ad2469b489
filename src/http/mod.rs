//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → cors.rs (preflight answered before routing)
//!     → request.rs (request ID, canonical URL, body buffering)
//!     → [routing resolves the upstream site]
//!     → [upstream fetch, redirect/HTML rewriting]
//!     → response.rs (compose headers, add CORS)
//!     → Send to client
//! ```

pub mod cors;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
