pub mod admin;
pub mod auth;
pub mod fulfillment_task;
pub mod middleware;
pub mod preview;
pub mod preview_task;
pub mod rest;
pub mod state;
pub mod submit_task;
pub mod upload_proxy;
pub mod wizard;
pub mod wizard_cache;

// Re-export the pieces the binary needs to build the router.
pub use middleware::require_auth;
pub use rest::{list_projects_handler, ApiDoc};
pub use state::AppState;

use axum::http::StatusCode;
use storyincolor_core::ports::PortError;

/// Maps a port-level failure onto the HTTP surface. Transient failures get a
/// retry-affordance status; not-found and validation conditions stay
/// distinguishable from crashes.
pub(crate) fn error_response(err: PortError) -> (StatusCode, String) {
    let status = match &err {
        PortError::Auth(_) => StatusCode::UNAUTHORIZED,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::Quota(_) => StatusCode::PAYLOAD_TOO_LARGE,
        PortError::Integrity(_) => StatusCode::CONFLICT,
        PortError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
