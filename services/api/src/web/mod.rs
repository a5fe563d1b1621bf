//! services/api/src/web/mod.rs
//!
//! The HTTP layer: handlers grouped by audience, the auth middleware, and
//! the shared error-to-response mapping every handler uses.

pub mod admin;
pub mod auth;
pub mod chat;
pub mod docs;
pub mod middleware;
pub mod progress;
pub mod sessions;
pub mod state;

pub use middleware::require_auth;

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use therapy_core::assignment::AssignmentError;
use therapy_core::lifecycle::LifecycleError;
use therapy_core::ports::PortError;

/// The JSON error body every failing endpoint returns.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// The error half of every handler's return type.
pub type HandlerError = (StatusCode, Json<ErrorBody>);

pub fn fail(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Maps port errors onto conventional status codes. Unexpected errors are
/// logged in full and surfaced as a generic 500.
pub fn port_failure(e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(msg) => fail(StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => fail(StatusCode::CONFLICT, msg),
        PortError::Forbidden(msg) => fail(StatusCode::FORBIDDEN, msg),
        PortError::Unauthorized => fail(StatusCode::UNAUTHORIZED, "Invalid or expired token"),
        PortError::Unexpected(msg) => {
            error!("Unexpected port error: {}", msg);
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred",
            )
        }
    }
}

/// Illegal transitions are conflicts; everything else the lifecycle policy
/// rejects is a bad request.
pub fn lifecycle_failure(e: LifecycleError) -> HandlerError {
    match e {
        LifecycleError::InvalidTransition { .. } => fail(StatusCode::CONFLICT, e.to_string()),
        other => fail(StatusCode::BAD_REQUEST, other.to_string()),
    }
}

pub fn assignment_failure(e: AssignmentError) -> HandlerError {
    fail(StatusCode::BAD_REQUEST, e.to_string())
}
