//! services/api/src/web/sessions.rs
//!
//! Session endpoints: booking, listing, and every lifecycle action a
//! client or doctor can take. Handlers load state, ask the core policies
//! for a decision, and persist the result; they never re-derive
//! transition rules themselves.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;
use crate::web::{fail, lifecycle_failure, port_failure, HandlerError};
use therapy_core::domain::{
    AuthUser, NewSession, Role, Session, SessionKind, SessionStatus,
};
use therapy_core::lifecycle::{self, CompletionInput};
use therapy_core::ports::SessionFilter;
use therapy_core::{assignment, Certification};

//=========================================================================================
// Views
//=========================================================================================

/// The session representation returned by every session endpoint.
#[derive(Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub client_id: Uuid,
    pub doctor_id: Option<Uuid>,
    #[schema(value_type = String)]
    pub kind: SessionKind,
    #[schema(value_type = String)]
    pub status: SessionStatus,
    pub needs_assignment: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub topic: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<String>,
    pub meeting_url: Option<String>,
    pub client_rating: Option<i16>,
    pub doctor_rating: Option<i16>,
    pub created_at: DateTime<Utc>,
}

impl From<Session> for SessionView {
    fn from(s: Session) -> Self {
        let needs_assignment = assignment::needs_assignment(s.kind, s.doctor_id);
        Self {
            id: s.id,
            client_id: s.client_id,
            doctor_id: s.doctor_id,
            kind: s.kind,
            status: s.status,
            needs_assignment,
            scheduled_at: s.scheduled_at,
            started_at: s.started_at,
            ended_at: s.ended_at,
            topic: s.topic,
            summary: s.summary,
            notes: s.notes,
            meeting_url: s.meeting_url,
            client_rating: s.client_rating,
            doctor_rating: s.doctor_rating,
            created_at: s.created_at,
        }
    }
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

async fn load_session(state: &AppState, session_id: Uuid) -> Result<Session, HandlerError> {
    state
        .db
        .get_session_by_id(session_id)
        .await
        .map_err(port_failure)
}

fn require_participant(session: &Session, user: &AuthUser) -> Result<(), HandlerError> {
    if session.has_participant(user.user_id) || user.role == Role::Admin {
        Ok(())
    } else {
        Err(fail(
            StatusCode::FORBIDDEN,
            "You are not part of this session",
        ))
    }
}

fn require_assigned_doctor(session: &Session, user: &AuthUser) -> Result<(), HandlerError> {
    if user.role == Role::Doctor && session.doctor_id == Some(user.user_id) {
        Ok(())
    } else {
        Err(fail(
            StatusCode::FORBIDDEN,
            "Only the assigned doctor can do this",
        ))
    }
}

fn parse_schedule(date: &str, time: &str) -> Result<DateTime<Utc>, HandlerError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| fail(StatusCode::BAD_REQUEST, "preferred_date must be YYYY-MM-DD"))?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| fail(StatusCode::BAD_REQUEST, "preferred_time must be HH:MM"))?;
    Ok(date.and_time(time).and_utc())
}

//=========================================================================================
// Booking
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct BookSessionRequest {
    pub preferred_date: String,
    pub preferred_time: String,
    pub reason: Option<String>,
    pub doctor_id: Option<Uuid>,
    /// `ai` or `human`.
    #[schema(value_type = String)]
    pub session_type: SessionKind,
}

#[derive(Serialize, ToSchema)]
pub struct BookSessionResponse {
    pub session: SessionView,
    /// True when the session waits for an admin to pick a therapist.
    pub needs_approval: bool,
}

/// Book a new therapy session.
///
/// A human session with no chosen doctor goes onto the admin's assignment
/// queue; everything else is scheduled immediately.
#[utoipa::path(
    post,
    path = "/sessions/request",
    request_body = BookSessionRequest,
    responses(
        (status = 201, description = "Session booked", body = BookSessionResponse),
        (status = 400, description = "Invalid booking request"),
        (status = 403, description = "Only clients can book sessions")
    ),
    security(("bearer_token" = []))
)]
pub async fn book_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<BookSessionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    if user.role != Role::Client {
        return Err(fail(
            StatusCode::FORBIDDEN,
            "Only clients can book sessions",
        ));
    }
    let scheduled_at = parse_schedule(&req.preferred_date, &req.preferred_time)?;

    // A pre-selected doctor must be assignable right now.
    if let Some(doctor_id) = req.doctor_id {
        let doctor = state
            .db
            .get_user_by_id(doctor_id)
            .await
            .map_err(port_failure)?;
        assignment::validate_assignee(&doctor).map_err(crate::web::assignment_failure)?;
    }

    let outcome = lifecycle::booking_outcome(req.session_type, req.doctor_id);
    let session = state
        .db
        .create_session(NewSession {
            client_id: user.user_id,
            doctor_id: req.doctor_id,
            kind: req.session_type,
            status: outcome.status,
            scheduled_at,
            topic: req.reason,
        })
        .await
        .map_err(port_failure)?;

    info!(
        "Client {} booked a {} session ({})",
        user.user_id, session.kind, session.status
    );
    let response = BookSessionResponse {
        needs_approval: outcome.needs_assignment,
        session: session.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

//=========================================================================================
// Listing and Detail
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SessionListQuery {
    pub status: Option<String>,
    /// Filter to sessions scheduled on this date (YYYY-MM-DD).
    pub date: Option<String>,
}

/// List the caller's own sessions, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    params(
        ("status" = Option<String>, Query, description = "Filter by session status"),
        ("date" = Option<String>, Query, description = "Filter by scheduled date (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "The caller's sessions", body = [SessionView]),
        (status = 400, description = "Invalid filter")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SessionListQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    if user.role == Role::Admin {
        return Err(fail(
            StatusCode::FORBIDDEN,
            "Admins use the assignment queue listing",
        ));
    }
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            raw.parse::<SessionStatus>()
                .map_err(|e| fail(StatusCode::BAD_REQUEST, e.to_string()))
        })
        .transpose()?;
    let on_date = query
        .date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| fail(StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD"))
        })
        .transpose()?;

    let sessions = state
        .db
        .list_sessions_for_user(user.user_id, user.role, SessionFilter { status, on_date })
        .await
        .map_err(port_failure)?;
    let views: Vec<SessionView> = sessions.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

/// Fetch one session the caller takes part in.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session", body = SessionView),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "No such session")
    ),
    security(("bearer_token" = []))
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = load_session(&state, session_id).await?;
    require_participant(&session, &user)?;
    Ok(Json(SessionView::from(session)))
}

//=========================================================================================
// Start
//=========================================================================================

/// Move a session into `in-progress`.
///
/// Human sessions are started by their assigned doctor and refuse to start
/// until a meeting URL is set; AI sessions are started by the client.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session started", body = SessionView),
        (status = 400, description = "Meeting URL missing"),
        (status = 409, description = "Session is not startable")
    ),
    security(("bearer_token" = []))
)]
pub async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = load_session(&state, session_id).await?;
    match session.kind {
        SessionKind::Human => require_assigned_doctor(&session, &user)?,
        SessionKind::Ai => {
            if session.client_id != user.user_id {
                return Err(fail(
                    StatusCode::FORBIDDEN,
                    "Only the session's client can start an AI session",
                ));
            }
        }
    }

    let update = lifecycle::start(&session, Utc::now()).map_err(lifecycle_failure)?;
    state
        .db
        .start_session(update.session_id, update.started_at)
        .await
        .map_err(port_failure)?;

    let session = load_session(&state, session_id).await?;
    Ok(Json(SessionView::from(session)))
}

//=========================================================================================
// Completion
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CompleteSessionRequest {
    pub quiz_answers: Option<Vec<String>>,
    pub quiz_score: Option<i16>,
    /// 1-5; recorded against the caller's side of the session.
    pub rating: Option<i16>,
    pub summary: Option<String>,
    /// True when the client ended the session without taking the quiz.
    pub skipped: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct CompleteSessionResponse {
    pub session: SessionView,
    /// Names of certifications unlocked by this completion.
    pub awarded_certifications: Vec<String>,
}

/// Complete (or skip out of) a session.
///
/// Completions carrying a quiz record the result; a passing score moves
/// the client's progress counters and may unlock certifications. The
/// whole outcome is persisted in one transaction.
#[utoipa::path(
    post,
    path = "/sessions/{id}/complete",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = CompleteSessionRequest,
    responses(
        (status = 200, description = "Session completed", body = CompleteSessionResponse),
        (status = 400, description = "Invalid quiz or rating data"),
        (status = 403, description = "Not a participant"),
        (status = 409, description = "Session already finalized")
    ),
    security(("bearer_token" = []))
)]
pub async fn complete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<CompleteSessionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = load_session(&state, session_id).await?;
    require_participant(&session, &user)?;

    let mut input = CompletionInput {
        skipped: req.skipped.unwrap_or(false),
        quiz_answers: req.quiz_answers,
        quiz_score: req.quiz_score,
        summary: req.summary,
        ..Default::default()
    };
    match user.role {
        Role::Doctor => input.doctor_rating = req.rating,
        _ => input.client_rating = req.rating,
    }

    let profile = state
        .db
        .get_or_create_profile(session.client_id)
        .await
        .map_err(port_failure)?;

    // Certification context is best-effort: a failure here must never
    // block the completion itself.
    let (definitions, awarded) = certification_context(&state, session.client_id).await;

    let plan = lifecycle::complete(
        &session,
        &input,
        &profile,
        &definitions,
        &awarded,
        Utc::now(),
    )
    .map_err(lifecycle_failure)?;

    state
        .db
        .apply_completion(&plan)
        .await
        .map_err(port_failure)?;

    let awarded_names: Vec<String> = definitions
        .iter()
        .filter(|c| plan.awards.contains(&c.id))
        .map(|c| c.name.clone())
        .collect();
    for name in &awarded_names {
        info!("Client {} earned certification '{}'", session.client_id, name);
    }

    let session = load_session(&state, session_id).await?;
    Ok(Json(CompleteSessionResponse {
        session: session.into(),
        awarded_certifications: awarded_names,
    }))
}

/// Loads the certification definitions and the client's existing awards,
/// degrading to "no certifications" on any failure.
async fn certification_context(
    state: &AppState,
    client_id: Uuid,
) -> (Vec<Certification>, Vec<Uuid>) {
    let definitions = match state.db.ensure_certifications().await {
        Ok(defs) => defs,
        Err(e) => {
            warn!("Skipping certification evaluation: {}", e);
            return (Vec::new(), Vec::new());
        }
    };
    let awarded = match state.db.list_user_certifications(client_id).await {
        Ok(existing) => existing.into_iter().map(|a| a.certification_id).collect(),
        Err(e) => {
            warn!("Could not load existing awards: {}", e);
            return (Vec::new(), Vec::new());
        }
    };
    (definitions, awarded)
}

//=========================================================================================
// Cancel
//=========================================================================================

/// Cancel a session that has not finished yet. Terminal.
#[utoipa::path(
    post,
    path = "/sessions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session cancelled", body = SessionView),
        (status = 403, description = "Not a participant"),
        (status = 409, description = "Session already finalized")
    ),
    security(("bearer_token" = []))
)]
pub async fn cancel_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = load_session(&state, session_id).await?;
    require_participant(&session, &user)?;

    let update = lifecycle::cancel(&session, Utc::now()).map_err(lifecycle_failure)?;
    state
        .db
        .cancel_session(update.session_id, update.ended_at, None)
        .await
        .map_err(port_failure)?;

    let session = load_session(&state, session_id).await?;
    Ok(Json(SessionView::from(session)))
}

//=========================================================================================
// Meeting URL and Doctor Notes
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct MeetingUrlRequest {
    pub meeting_url: String,
}

/// Set the video-call link a human session starts with.
#[utoipa::path(
    put,
    path = "/sessions/{id}/meeting-url",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = MeetingUrlRequest,
    responses(
        (status = 200, description = "Meeting URL set", body = SessionView),
        (status = 400, description = "Invalid URL"),
        (status = 403, description = "Not the assigned doctor")
    ),
    security(("bearer_token" = []))
)]
pub async fn set_meeting_url_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<MeetingUrlRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = load_session(&state, session_id).await?;
    require_assigned_doctor(&session, &user)?;
    if !req.meeting_url.starts_with("http") {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            "meeting_url must be an http(s) link",
        ));
    }

    state
        .db
        .set_meeting_url(session_id, &req.meeting_url)
        .await
        .map_err(port_failure)?;

    let session = load_session(&state, session_id).await?;
    Ok(Json(SessionView::from(session)))
}

#[derive(Deserialize, ToSchema)]
pub struct SessionNotesRequest {
    pub notes: String,
}

/// Submit session notes for admin review.
#[utoipa::path(
    post,
    path = "/sessions/{id}/notes",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SessionNotesRequest,
    responses(
        (status = 200, description = "Notes submitted for review", body = SessionView),
        (status = 403, description = "Not the assigned doctor"),
        (status = 409, description = "Session is not completed")
    ),
    security(("bearer_token" = []))
)]
pub async fn submit_notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SessionNotesRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = load_session(&state, session_id).await?;
    require_assigned_doctor(&session, &user)?;
    if req.notes.trim().is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "Notes cannot be empty"));
    }

    lifecycle::submit_notes(&session).map_err(lifecycle_failure)?;
    state
        .db
        .submit_session_notes(session_id, req.notes.trim())
        .await
        .map_err(port_failure)?;

    let session = load_session(&state, session_id).await?;
    Ok(Json(SessionView::from(session)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_parsing_accepts_date_and_time() {
        let parsed = parse_schedule("2024-06-01", "14:30").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T14:30:00+00:00");
    }

    #[test]
    fn schedule_parsing_rejects_garbage() {
        assert!(parse_schedule("June 1st", "14:30").is_err());
        assert!(parse_schedule("2024-06-01", "2pm").is_err());
    }
}
