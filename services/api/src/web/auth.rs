//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;
use crate::web::{fail, port_failure, HandlerError};
use therapy_core::domain::Role;
use therapy_core::ports::PortError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// `client` (default) or `doctor`. Admin accounts are seeded, not registered.
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    #[schema(value_type = String)]
    pub role: Role,
    pub token: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    // 1. Validate the request
    if !req.email.contains('@') {
        return Err(fail(StatusCode::BAD_REQUEST, "A valid email is required"));
    }
    if req.password.len() < 8 {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
        ));
    }
    if req.display_name.trim().is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "A display name is required"));
    }
    let role = match req.role.as_deref() {
        None => Role::Client,
        Some(raw) => raw
            .parse::<Role>()
            .ok()
            .filter(|r| *r != Role::Admin)
            .ok_or_else(|| {
                fail(
                    StatusCode::BAD_REQUEST,
                    "Role must be 'client' or 'doctor'",
                )
            })?,
    };

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password",
            )
        })?
        .to_string();

    // 3. Create user in database
    let user = state
        .db
        .create_user(&req.email, &password_hash, req.display_name.trim(), role)
        .await
        .map_err(port_failure)?;

    // 4. Issue a bearer token
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(state.config.token_ttl_days);
    state
        .db
        .create_auth_token(&token, user.id, expires_at)
        .await
        .map_err(port_failure)?;

    let response = AuthResponse {
        user_id: user.id,
        email: user.email,
        role: user.role,
        token,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    // 1. Get user by email. A missing account reads the same as a bad
    // password from the outside.
    let user_creds = state
        .db
        .get_user_by_email(&req.email)
        .await
        .map_err(|_| fail(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;

    if !user_creds.is_active {
        return Err(fail(StatusCode::FORBIDDEN, "Account is deactivated"));
    }

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        fail(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error")
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err(fail(StatusCode::UNAUTHORIZED, "Invalid email or password"));
    }

    // 3. Issue a bearer token
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(state.config.token_ttl_days);
    state
        .db
        .create_auth_token(&token, user_creds.user_id, expires_at)
        .await
        .map_err(port_failure)?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
        role: user_creds.role,
        token,
    };
    Ok((StatusCode::OK, Json(response)))
}

/// POST /auth/logout - Logout and invalidate the presented token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No token presented")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "No token presented"))?;

    state.db.delete_auth_token(token).await.map_err(|e| {
        error!("Failed to delete auth token: {:?}", e);
        port_failure(PortError::Unexpected("Failed to logout".to_string()))
    })?;

    Ok(StatusCode::OK)
}
