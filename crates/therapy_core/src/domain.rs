//! crates/therapy_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when a stored string does not map to a domain enum.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

//=========================================================================================
// Users and Roles
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Doctor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
    pub is_active: bool,
}

/// The identity carried by a validated bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

//=========================================================================================
// Sessions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Ai,
    Human,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Ai => write!(f, "ai"),
            SessionKind::Human => write!(f, "human"),
        }
    }
}

impl FromStr for SessionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(SessionKind::Ai),
            "human" => Ok(SessionKind::Human),
            other => Err(ParseEnumError {
                kind: "session kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    PendingApproval,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Scheduled => write!(f, "scheduled"),
            SessionStatus::InProgress => write!(f, "in-progress"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
            SessionStatus::PendingApproval => write!(f, "pending-approval"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "scheduled" => Ok(SessionStatus::Scheduled),
            "in-progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            "pending-approval" => Ok(SessionStatus::PendingApproval),
            other => Err(ParseEnumError {
                kind: "session status",
                value: other.to_string(),
            }),
        }
    }
}

/// One scheduled or ad-hoc therapy encounter, AI- or human-led.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub client_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub kind: SessionKind,
    pub status: SessionStatus,
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

impl Session {
    /// Whether the given user takes part in this session.
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.client_id == user_id || self.doctor_id == Some(user_id)
    }
}

/// Fields required to persist a freshly booked session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub client_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub kind: SessionKind,
    pub status: SessionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub topic: Option<String>,
}

//=========================================================================================
// Quiz Results and Client Progress
//=========================================================================================

/// The scored outcome of a post-session reflection quiz.
#[derive(Debug, Clone)]
pub struct QuizResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub client_id: Uuid,
    pub answers: Vec<String>,
    pub score: i16,
    pub completed_at: DateTime<Utc>,
}

/// Aggregate progress counters kept per client.
#[derive(Debug, Clone)]
pub struct ClientProfile {
    pub user_id: Uuid,
    pub total_sessions_completed: i32,
    pub total_quizzes_completed: i32,
    pub progress_level: i32,
}

//=========================================================================================
// Certifications
//=========================================================================================

/// A static certification definition with its award thresholds.
#[derive(Debug, Clone)]
pub struct Certification {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub required_sessions: i32,
    pub required_quizzes: i32,
    pub minimum_score: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CertificationStatus {
    InProgress,
    Completed,
}

impl fmt::Display for CertificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificationStatus::InProgress => write!(f, "in-progress"),
            CertificationStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for CertificationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-progress" => Ok(CertificationStatus::InProgress),
            "completed" => Ok(CertificationStatus::Completed),
            other => Err(ParseEnumError {
                kind: "certification status",
                value: other.to_string(),
            }),
        }
    }
}

/// The per-client award record for one certification.
#[derive(Debug, Clone)]
pub struct UserCertification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub certification_id: Uuid,
    pub status: CertificationStatus,
    pub progress_percentage: i16,
    pub earned_at: Option<DateTime<Utc>>,
    pub is_approved: bool,
}

//=========================================================================================
// AI Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    Client,
    Assistant,
}

impl fmt::Display for ChatSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatSender::Client => write!(f, "client"),
            ChatSender::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for ChatSender {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(ChatSender::Client),
            "assistant" => Ok(ChatSender::Assistant),
            other => Err(ParseEnumError {
                kind: "chat sender",
                value: other.to_string(),
            }),
        }
    }
}

/// One message exchanged inside an AI-led session.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender: ChatSender,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
