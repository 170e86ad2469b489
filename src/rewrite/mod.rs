//! Response transformation subsystem.
//!
//! # Data Flow
//! ```text
//! UpstreamResponse
//!     → 3xx?  redirect.rs (Location rewrite / suppression)
//!     → HTML? html/ (nine-stage rewrite engine)
//!     → else  streamed through untouched
//!
//! urls.rs: one URL classification shared by both rewriters
//! assets.rs: markup the proxy injects or serves itself
//! ```

pub mod assets;
pub mod html;
pub mod redirect;
pub mod urls;

pub use html::transform;
pub use redirect::{rewrite_location, RedirectOutcome};
pub use urls::{Mount, RewriteContext};
