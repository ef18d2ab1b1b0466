pub mod pending_requests;
pub mod rewrite_engine;

pub use pending_requests::{PendingRequest, PendingRequestTable, DEFAULT_PENDING_WINDOW};
pub use rewrite_engine::{RewriteEngine, RewriteOutcome};
