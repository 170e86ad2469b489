//! Mirror reverse proxy library.
//!
//! Serves several upstream sites under one public origin, rewriting
//! redirects and HTML so that every link stays on the mirror.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod rewrite;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
