//! crates/therapy_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AuthUser, Certification, ChatMessage, ClientProfile, NewSession, QuizResult, Role, Session,
    SessionStatus, User, UserCertification, UserCredentials,
};
use crate::lifecycle::CompletionPlan;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Query Types
//=========================================================================================

/// Optional filters for the session listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub on_date: Option<chrono::NaiveDate>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        role: Role,
    ) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn list_doctors(&self) -> PortResult<Vec<User>>;

    async fn approve_doctor(&self, user_id: Uuid) -> PortResult<User>;

    // --- Auth Tokens ---
    async fn create_auth_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_token(&self, token: &str) -> PortResult<AuthUser>;

    async fn delete_auth_token(&self, token: &str) -> PortResult<()>;

    // --- Session Management ---
    async fn create_session(&self, new_session: NewSession) -> PortResult<Session>;

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session>;

    async fn list_sessions_for_user(
        &self,
        user_id: Uuid,
        role: Role,
        filter: SessionFilter,
    ) -> PortResult<Vec<Session>>;

    async fn list_sessions_needing_assignment(&self) -> PortResult<Vec<Session>>;

    async fn start_session(
        &self,
        session_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn set_meeting_url(&self, session_id: Uuid, meeting_url: &str) -> PortResult<()>;

    async fn assign_doctor(
        &self,
        session_id: Uuid,
        doctor_id: Uuid,
        new_status: Option<SessionStatus>,
    ) -> PortResult<()>;

    async fn cancel_session(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
        summary: Option<&str>,
    ) -> PortResult<()>;

    /// Applies a completion plan in a single transaction: the session
    /// update, the quiz result, the profile counters, and any awards
    /// either all land or none do.
    async fn apply_completion(&self, plan: &CompletionPlan) -> PortResult<()>;

    async fn submit_session_notes(&self, session_id: Uuid, notes: &str) -> PortResult<()>;

    async fn finalize_session_review(&self, session_id: Uuid) -> PortResult<()>;

    async fn get_quiz_result_for_session(&self, session_id: Uuid)
        -> PortResult<Option<QuizResult>>;

    // --- Client Progress ---
    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<ClientProfile>;

    // --- Certifications ---

    /// Returns every certification definition, provisioning the default set
    /// first if the table is empty.
    async fn ensure_certifications(&self) -> PortResult<Vec<Certification>>;

    async fn list_user_certifications(&self, user_id: Uuid)
        -> PortResult<Vec<UserCertification>>;

    // --- AI Chat ---
    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()>;

    async fn get_chat_messages(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>>;
}

#[async_trait]
pub trait TherapyChatService: Send + Sync {
    /// Generates the assistant's reply for one client message, given the
    /// session topic and the conversation so far.
    async fn reply(
        &self,
        topic: Option<&str>,
        history: &[ChatMessage],
        message: &str,
    ) -> PortResult<String>;
}
