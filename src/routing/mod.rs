//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → resolver.rs (longest-prefix lookup, default fallback)
//!     → Resolution { route, residual_path }
//!     → route.rs (upstream base + residual path + query = UpstreamTarget)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → validate (bad upstreams/prefixes dropped)
//!     → sort by prefix length
//!     → freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Policy branches on `RouteTag`, never on route names

pub mod resolver;
pub mod route;

pub use resolver::{apply_route_prefix, strip_route_prefix, Resolution, RouteTable};
pub use route::{Route, RoutePolicy, RouteTag, UpstreamTarget};
