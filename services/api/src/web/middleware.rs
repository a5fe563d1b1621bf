//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::web::state::AppState;
use crate::web::{fail, port_failure, HandlerError};
use therapy_core::ports::PortError;

/// Middleware that validates the bearer token and extracts the caller.
///
/// If valid, inserts the `AuthUser` into request extensions for handlers to use.
/// If invalid, missing, or expired, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HandlerError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Expected a bearer token"))?;

    let auth_user = state
        .db
        .validate_auth_token(token)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => fail(StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            other => port_failure(other),
        })?;

    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}
