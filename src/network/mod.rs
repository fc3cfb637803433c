// Base resolution, configuration and the fetch wrapper
pub mod base;
pub mod config;
pub mod fetch_shim;
pub mod rewriter;

// Re-export commonly used items
pub use base::{BaseResolver, BaseSource, PageSnapshot, ResolvedBase};
pub use config::{HostWhitelist, PathWhitelist, RelayConfig, RelayConfigPatch};
pub use rewriter::{Classification, RequestRewriter, RewriteDecision, SkipReason};
