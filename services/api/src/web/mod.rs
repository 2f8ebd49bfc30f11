pub mod ai;
pub mod api_doc;
pub mod auth;
pub mod extract;
pub mod health;
pub mod middleware;
pub mod notes;
pub mod router;
pub mod state;


// Re-export what the binaries need to build the web server.
pub use api_doc::ApiDoc;
pub use middleware::require_auth;
pub use router::build_router;
pub use state::{Adapters, AppState};

use crate::error::ApiError;

/// Parses a path id, which must be a positive integer.
pub(crate) fn parse_id(raw: &str, message: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}
