//! services/api/src/web/progress.rs
//!
//! Client-facing progress surfaces: the profile counters and the
//! certification wall.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;
use crate::web::{fail, port_failure, HandlerError};
use therapy_core::certification;
use therapy_core::domain::{AuthUser, CertificationStatus, Role};

#[derive(Serialize, ToSchema)]
pub struct ProfileView {
    pub user_id: Uuid,
    pub total_sessions_completed: i32,
    pub total_quizzes_completed: i32,
    pub progress_level: i32,
}

/// The caller's progress counters.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The caller's progress profile", body = ProfileView),
        (status = 403, description = "Clients only")
    ),
    security(("bearer_token" = []))
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    if user.role != Role::Client {
        return Err(fail(StatusCode::FORBIDDEN, "Clients only"));
    }
    let profile = state
        .db
        .get_or_create_profile(user.user_id)
        .await
        .map_err(port_failure)?;
    Ok(Json(ProfileView {
        user_id: profile.user_id,
        total_sessions_completed: profile.total_sessions_completed,
        total_quizzes_completed: profile.total_quizzes_completed,
        progress_level: profile.progress_level,
    }))
}

#[derive(Serialize, ToSchema)]
pub struct CertificationProgressView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub required_sessions: i32,
    pub required_quizzes: i32,
    pub minimum_score: i16,
    #[schema(value_type = String)]
    pub status: CertificationStatus,
    pub progress_percentage: i16,
    pub earned_at: Option<DateTime<Utc>>,
    pub is_approved: bool,
}

/// Every certification, either earned or with progress toward it.
#[utoipa::path(
    get,
    path = "/certifications",
    responses(
        (status = 200, description = "Certification progress", body = [CertificationProgressView]),
        (status = 403, description = "Clients only")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_certifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    if user.role != Role::Client {
        return Err(fail(StatusCode::FORBIDDEN, "Clients only"));
    }

    let definitions = state
        .db
        .ensure_certifications()
        .await
        .map_err(port_failure)?;
    let awards = state
        .db
        .list_user_certifications(user.user_id)
        .await
        .map_err(port_failure)?;
    let profile = state
        .db
        .get_or_create_profile(user.user_id)
        .await
        .map_err(port_failure)?;

    let views: Vec<CertificationProgressView> = definitions
        .into_iter()
        .map(|cert| {
            let award = awards.iter().find(|a| a.certification_id == cert.id);
            match award {
                Some(a) => CertificationProgressView {
                    id: cert.id,
                    name: cert.name,
                    description: cert.description,
                    required_sessions: cert.required_sessions,
                    required_quizzes: cert.required_quizzes,
                    minimum_score: cert.minimum_score,
                    status: a.status,
                    progress_percentage: a.progress_percentage,
                    earned_at: a.earned_at,
                    is_approved: a.is_approved,
                },
                None => {
                    let progress = certification::progress_percentage(&cert, &profile);
                    CertificationProgressView {
                        id: cert.id,
                        name: cert.name,
                        description: cert.description,
                        required_sessions: cert.required_sessions,
                        required_quizzes: cert.required_quizzes,
                        minimum_score: cert.minimum_score,
                        status: CertificationStatus::InProgress,
                        progress_percentage: progress,
                        earned_at: None,
                        is_approved: false,
                    }
                }
            }
        })
        .collect();
    Ok(Json(views))
}
