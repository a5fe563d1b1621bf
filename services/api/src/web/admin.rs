//! services/api/src/web/admin.rs
//!
//! Admin endpoints: the assignment queue, doctor approval, and session
//! note review.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::sessions::SessionView;
use crate::web::state::AppState;
use crate::web::{assignment_failure, fail, lifecycle_failure, port_failure, HandlerError};
use therapy_core::domain::{AuthUser, Role, User};
use therapy_core::{assignment, lifecycle};

fn require_admin(user: &AuthUser) -> Result<(), HandlerError> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(fail(StatusCode::FORBIDDEN, "Admin access required"))
    }
}

#[derive(Serialize, ToSchema)]
pub struct DoctorView {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_active: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for DoctorView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
            is_active: u.is_active,
            is_approved: u.is_approved,
            created_at: u.created_at,
        }
    }
}

//=========================================================================================
// Assignment Queue
//=========================================================================================

/// List human sessions still waiting for a therapist.
#[utoipa::path(
    get,
    path = "/admin/sessions",
    responses(
        (status = 200, description = "Sessions awaiting assignment", body = [SessionView]),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_unassigned_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    require_admin(&user)?;
    let sessions = state
        .db
        .list_sessions_needing_assignment()
        .await
        .map_err(port_failure)?;
    let views: Vec<SessionView> = sessions.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

#[derive(Deserialize, ToSchema)]
pub struct AssignDoctorRequest {
    pub doctor_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct AssignDoctorResponse {
    pub session: SessionView,
    pub doctor_name: String,
}

/// Assign a doctor to a session awaiting one.
#[utoipa::path(
    put,
    path = "/admin/sessions/{id}/assign",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = AssignDoctorRequest,
    responses(
        (status = 200, description = "Doctor assigned", body = AssignDoctorResponse),
        (status = 400, description = "Doctor is not assignable"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Session or doctor not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn assign_doctor_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AssignDoctorRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    require_admin(&user)?;
    let session = state
        .db
        .get_session_by_id(session_id)
        .await
        .map_err(port_failure)?;
    let doctor = state
        .db
        .get_user_by_id(req.doctor_id)
        .await
        .map_err(port_failure)?;

    let update = assignment::assign(&session, &doctor).map_err(assignment_failure)?;
    if let Some(new_status) = update.new_status {
        info!(
            "Assignment moves session {} from {} to {}",
            session.id, session.status, new_status
        );
    }
    state
        .db
        .assign_doctor(update.session_id, update.doctor_id, update.new_status)
        .await
        .map_err(port_failure)?;

    let session = state
        .db
        .get_session_by_id(session_id)
        .await
        .map_err(port_failure)?;
    Ok(Json(AssignDoctorResponse {
        session: session.into(),
        doctor_name: doctor.display_name,
    }))
}

/// Close the review of a session whose notes a doctor submitted.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/review",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Review finalized", body = SessionView),
        (status = 403, description = "Admin access required"),
        (status = 409, description = "Session is not under review")
    ),
    security(("bearer_token" = []))
)]
pub async fn review_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    require_admin(&user)?;
    let session = state
        .db
        .get_session_by_id(session_id)
        .await
        .map_err(port_failure)?;

    lifecycle::finalize_review(&session).map_err(lifecycle_failure)?;
    state
        .db
        .finalize_session_review(session_id)
        .await
        .map_err(port_failure)?;

    let session = state
        .db
        .get_session_by_id(session_id)
        .await
        .map_err(port_failure)?;
    Ok(Json(SessionView::from(session)))
}

//=========================================================================================
// Doctor Approval
//=========================================================================================

/// List every doctor account with its approval state.
#[utoipa::path(
    get,
    path = "/admin/doctors",
    responses(
        (status = 200, description = "All doctor accounts", body = [DoctorView]),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_doctors_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    require_admin(&user)?;
    let doctors = state.db.list_doctors().await.map_err(port_failure)?;
    let views: Vec<DoctorView> = doctors.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

/// Approve a doctor so they can receive session assignments.
#[utoipa::path(
    put,
    path = "/admin/doctors/{id}/approve",
    params(("id" = Uuid, Path, description = "Doctor user id")),
    responses(
        (status = 200, description = "Doctor approved", body = DoctorView),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "No such doctor")
    ),
    security(("bearer_token" = []))
)]
pub async fn approve_doctor_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    require_admin(&user)?;
    let doctor = state
        .db
        .approve_doctor(doctor_id)
        .await
        .map_err(port_failure)?;
    info!("Doctor {} approved by {}", doctor.id, user.user_id);
    Ok(Json(DoctorView::from(doctor)))
}
