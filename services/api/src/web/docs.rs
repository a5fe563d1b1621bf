//! services/api/src/web/docs.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the bearer-token scheme the protected routes reference.
struct BearerToken;

impl Modify for BearerToken {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::sessions::book_session_handler,
        crate::web::sessions::list_sessions_handler,
        crate::web::sessions::get_session_handler,
        crate::web::sessions::start_session_handler,
        crate::web::sessions::complete_session_handler,
        crate::web::sessions::cancel_session_handler,
        crate::web::sessions::set_meeting_url_handler,
        crate::web::sessions::submit_notes_handler,
        crate::web::chat::post_chat_message_handler,
        crate::web::chat::list_chat_messages_handler,
        crate::web::progress::get_profile_handler,
        crate::web::progress::list_certifications_handler,
        crate::web::admin::list_unassigned_sessions_handler,
        crate::web::admin::assign_doctor_handler,
        crate::web::admin::review_session_handler,
        crate::web::admin::list_doctors_handler,
        crate::web::admin::approve_doctor_handler,
    ),
    components(schemas(
        crate::web::ErrorBody,
        crate::web::auth::SignupRequest,
        crate::web::auth::LoginRequest,
        crate::web::auth::AuthResponse,
        crate::web::sessions::SessionView,
        crate::web::sessions::BookSessionRequest,
        crate::web::sessions::BookSessionResponse,
        crate::web::sessions::CompleteSessionRequest,
        crate::web::sessions::CompleteSessionResponse,
        crate::web::sessions::MeetingUrlRequest,
        crate::web::sessions::SessionNotesRequest,
        crate::web::chat::PostMessageRequest,
        crate::web::chat::ChatMessageView,
        crate::web::progress::ProfileView,
        crate::web::progress::CertificationProgressView,
        crate::web::admin::AssignDoctorRequest,
        crate::web::admin::AssignDoctorResponse,
        crate::web::admin::DoctorView,
    )),
    modifiers(&BearerToken),
    tags(
        (name = "Therapy Sessions API", description = "Booking, session lifecycle, and client progress endpoints.")
    )
)]
pub struct ApiDoc;
