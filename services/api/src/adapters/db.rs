//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use therapy_core::certification;
use therapy_core::domain::{
    AuthUser, Certification, CertificationStatus, ChatMessage, ChatSender, ClientProfile,
    NewSession, QuizResult, Role, Session, SessionKind, SessionStatus, User, UserCertification,
    UserCredentials,
};
use therapy_core::lifecycle::CompletionPlan;
use therapy_core::ports::{DatabaseService, PortError, PortResult, SessionFilter};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(e: sqlx::Error, what: &str) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.to_string()),
        other => unexpected(other),
    }
}

fn conflict_or(e: sqlx::Error, what: &str) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(what.to_string())
        }
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    display_name: String,
    role: String,
    is_active: bool,
    is_approved: bool,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            role: Role::from_str(&self.role).map_err(unexpected)?,
            is_active: self.is_active,
            is_approved: self.is_approved,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
    role: String,
    is_active: bool,
}

impl CredentialsRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        Ok(UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
            role: Role::from_str(&self.role).map_err(unexpected)?,
            is_active: self.is_active,
        })
    }
}

#[derive(FromRow)]
struct AuthUserRecord {
    user_id: Uuid,
    email: String,
    role: String,
}

impl AuthUserRecord {
    fn to_domain(self) -> PortResult<AuthUser> {
        Ok(AuthUser {
            user_id: self.user_id,
            email: self.email,
            role: Role::from_str(&self.role).map_err(unexpected)?,
        })
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    client_id: Uuid,
    doctor_id: Option<Uuid>,
    kind: String,
    status: String,
    scheduled_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    topic: Option<String>,
    summary: Option<String>,
    notes: Option<String>,
    meeting_url: Option<String>,
    client_rating: Option<i16>,
    doctor_rating: Option<i16>,
    created_at: DateTime<Utc>,
}

impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        Ok(Session {
            id: self.id,
            client_id: self.client_id,
            doctor_id: self.doctor_id,
            kind: SessionKind::from_str(&self.kind).map_err(unexpected)?,
            status: SessionStatus::from_str(&self.status).map_err(unexpected)?,
            scheduled_at: self.scheduled_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            topic: self.topic,
            summary: self.summary,
            notes: self.notes,
            meeting_url: self.meeting_url,
            client_rating: self.client_rating,
            doctor_rating: self.doctor_rating,
            created_at: self.created_at,
        })
    }
}

const SESSION_COLUMNS: &str = "id, client_id, doctor_id, kind, status, scheduled_at, \
     started_at, ended_at, topic, summary, notes, meeting_url, client_rating, doctor_rating, \
     created_at";

#[derive(FromRow)]
struct QuizResultRecord {
    id: Uuid,
    session_id: Uuid,
    client_id: Uuid,
    answers: String,
    score: i16,
    completed_at: DateTime<Utc>,
}

impl QuizResultRecord {
    fn to_domain(self) -> PortResult<QuizResult> {
        Ok(QuizResult {
            id: self.id,
            session_id: self.session_id,
            client_id: self.client_id,
            answers: serde_json::from_str(&self.answers).map_err(unexpected)?,
            score: self.score,
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    total_sessions_completed: i32,
    total_quizzes_completed: i32,
    progress_level: i32,
}

impl ProfileRecord {
    fn to_domain(self) -> ClientProfile {
        ClientProfile {
            user_id: self.user_id,
            total_sessions_completed: self.total_sessions_completed,
            total_quizzes_completed: self.total_quizzes_completed,
            progress_level: self.progress_level,
        }
    }
}

#[derive(FromRow)]
struct CertificationRecord {
    id: Uuid,
    name: String,
    description: String,
    required_sessions: i32,
    required_quizzes: i32,
    minimum_score: i16,
}

impl CertificationRecord {
    fn to_domain(self) -> Certification {
        Certification {
            id: self.id,
            name: self.name,
            description: self.description,
            required_sessions: self.required_sessions,
            required_quizzes: self.required_quizzes,
            minimum_score: self.minimum_score,
        }
    }
}

#[derive(FromRow)]
struct UserCertificationRecord {
    id: Uuid,
    user_id: Uuid,
    certification_id: Uuid,
    status: String,
    progress_percentage: i16,
    earned_at: Option<DateTime<Utc>>,
    is_approved: bool,
}

impl UserCertificationRecord {
    fn to_domain(self) -> PortResult<UserCertification> {
        Ok(UserCertification {
            id: self.id,
            user_id: self.user_id,
            certification_id: self.certification_id,
            status: CertificationStatus::from_str(&self.status).map_err(unexpected)?,
            progress_percentage: self.progress_percentage,
            earned_at: self.earned_at,
            is_approved: self.is_approved,
        })
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    session_id: Uuid,
    sender: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl ChatMessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        Ok(ChatMessage {
            id: self.id,
            session_id: self.session_id,
            sender: ChatSender::from_str(&self.sender).map_err(unexpected)?,
            body: self.body,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for PgStore {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        role: Role,
    ) -> PortResult<User> {
        // Doctors need an admin's approval before they can take sessions.
        let is_approved = role != Role::Doctor;
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, hashed_password, display_name, role, is_active, is_approved)
             VALUES ($1, $2, $3, $4, $5, TRUE, $6)
             RETURNING id, email, display_name, role, is_active, is_approved, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(display_name)
        .bind(role.to_string())
        .bind(is_approved)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "email is already registered"))?;
        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, display_name, role, is_active, is_approved, created_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, &format!("User {} not found", user_id)))?;
        record.to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password, role, is_active FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, &format!("User {} not found", email)))?;
        record.to_domain()
    }

    async fn list_doctors(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, display_name, role, is_active, is_approved, created_at
             FROM users WHERE role = 'doctor' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn approve_doctor(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET is_approved = TRUE WHERE id = $1 AND role = 'doctor'
             RETURNING id, email, display_name, role, is_active, is_approved, created_at",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, &format!("Doctor {} not found", user_id)))?;
        record.to_domain()
    }

    async fn create_auth_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_token(&self, token: &str) -> PortResult<AuthUser> {
        let record = sqlx::query_as::<_, AuthUserRecord>(
            "SELECT u.id AS user_id, u.email, u.role
             FROM auth_tokens t
             JOIN users u ON u.id = t.user_id
             WHERE t.token = $1 AND t.expires_at > NOW() AND u.is_active",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            other => unexpected(other),
        })?;
        record.to_domain()
    }

    async fn delete_auth_token(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_session(&self, new_session: NewSession) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO sessions (id, client_id, doctor_id, kind, status, scheduled_at, topic)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_session.client_id)
        .bind(new_session.doctor_id)
        .bind(new_session.kind.to_string())
        .bind(new_session.status.to_string())
        .bind(new_session.scheduled_at)
        .bind(new_session.topic)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, &format!("Session {} not found", session_id)))?;
        record.to_domain()
    }

    async fn list_sessions_for_user(
        &self,
        user_id: Uuid,
        role: Role,
        filter: SessionFilter,
    ) -> PortResult<Vec<Session>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE "));
        match role {
            Role::Doctor => {
                qb.push("doctor_id = ").push_bind(user_id);
            }
            _ => {
                qb.push("client_id = ").push_bind(user_id);
            }
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(date) = filter.on_date {
            qb.push(" AND (scheduled_at AT TIME ZONE 'UTC')::date = ")
                .push_bind(date);
        }
        qb.push(" ORDER BY scheduled_at DESC NULLS LAST, created_at DESC");

        let records = qb
            .build_query_as::<SessionRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(SessionRecord::to_domain).collect()
    }

    async fn list_sessions_needing_assignment(&self) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE kind = 'human' AND doctor_id IS NULL AND status = 'pending'
             ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SessionRecord::to_domain).collect()
    }

    async fn start_session(
        &self,
        session_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET status = 'in-progress', started_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(started_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn set_meeting_url(&self, session_id: Uuid, meeting_url: &str) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET meeting_url = $2 WHERE id = $1")
            .bind(session_id)
            .bind(meeting_url)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn assign_doctor(
        &self,
        session_id: Uuid,
        doctor_id: Uuid,
        new_status: Option<SessionStatus>,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE sessions SET doctor_id = $2, status = COALESCE($3, status) WHERE id = $1",
        )
        .bind(session_id)
        .bind(doctor_id)
        .bind(new_status.map(|s| s.to_string()))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn cancel_session(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
        summary: Option<&str>,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE sessions SET status = 'cancelled', ended_at = $2,
             summary = COALESCE($3, summary) WHERE id = $1",
        )
        .bind(session_id)
        .bind(ended_at)
        .bind(summary)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn apply_completion(&self, plan: &CompletionPlan) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The status guard makes a racing second completion lose cleanly
        // instead of double-counting.
        let updated = sqlx::query(
            "UPDATE sessions
             SET status = $2, ended_at = $3,
                 summary = COALESCE($4, summary),
                 client_rating = COALESCE($5, client_rating),
                 doctor_rating = COALESCE($6, doctor_rating)
             WHERE id = $1 AND status NOT IN ('completed', 'cancelled', 'pending-approval')",
        )
        .bind(plan.session_id)
        .bind(plan.status.to_string())
        .bind(plan.ended_at)
        .bind(plan.summary.as_deref())
        .bind(plan.client_rating)
        .bind(plan.doctor_rating)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        if updated.rows_affected() == 0 {
            return Err(PortError::Conflict(
                "session was already finalized".to_string(),
            ));
        }

        if let Some(quiz) = &plan.quiz {
            let answers = serde_json::to_string(&quiz.answers).map_err(unexpected)?;
            sqlx::query(
                "INSERT INTO quiz_results (id, session_id, client_id, answers, score, completed_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(plan.session_id)
            .bind(quiz.client_id)
            .bind(answers)
            .bind(quiz.score)
            .bind(plan.ended_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, "session already has a quiz result"))?;
        }

        if let Some(counters) = &plan.counters {
            sqlx::query(
                "INSERT INTO client_profiles
                     (user_id, total_sessions_completed, total_quizzes_completed, progress_level)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (user_id) DO UPDATE SET
                     total_sessions_completed = EXCLUDED.total_sessions_completed,
                     total_quizzes_completed = EXCLUDED.total_quizzes_completed,
                     progress_level = EXCLUDED.progress_level",
            )
            .bind(counters.user_id)
            .bind(counters.total_sessions_completed)
            .bind(counters.total_quizzes_completed)
            .bind(counters.progress_level)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

            for certification_id in &plan.awards {
                sqlx::query(
                    "INSERT INTO user_certifications
                         (id, user_id, certification_id, status, progress_percentage, earned_at, is_approved)
                     VALUES ($1, $2, $3, 'completed', 100, $4, TRUE)
                     ON CONFLICT (user_id, certification_id) DO NOTHING",
                )
                .bind(Uuid::new_v4())
                .bind(counters.user_id)
                .bind(certification_id)
                .bind(plan.ended_at)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
            }
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn submit_session_notes(&self, session_id: Uuid, notes: &str) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET status = 'pending-approval', notes = $2 WHERE id = $1")
            .bind(session_id)
            .bind(notes)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn finalize_session_review(&self, session_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET status = 'completed' WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_quiz_result_for_session(
        &self,
        session_id: Uuid,
    ) -> PortResult<Option<QuizResult>> {
        let record = sqlx::query_as::<_, QuizResultRecord>(
            "SELECT id, session_id, client_id, answers, score, completed_at
             FROM quiz_results WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(QuizResultRecord::to_domain).transpose()
    }

    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<ClientProfile> {
        sqlx::query(
            "INSERT INTO client_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT user_id, total_sessions_completed, total_quizzes_completed, progress_level
             FROM client_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, &format!("Profile for {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn ensure_certifications(&self) -> PortResult<Vec<Certification>> {
        let select = "SELECT id, name, description, required_sessions, required_quizzes, \
             minimum_score FROM certifications ORDER BY required_sessions ASC";

        let records = sqlx::query_as::<_, CertificationRecord>(select)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        if !records.is_empty() {
            return Ok(records
                .into_iter()
                .map(CertificationRecord::to_domain)
                .collect());
        }

        // First evaluation against an empty table: provision the defaults.
        info!("No certification definitions found, provisioning the default set");
        for seed in certification::default_certifications() {
            sqlx::query(
                "INSERT INTO certifications
                     (id, name, description, required_sessions, required_quizzes, minimum_score)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (name) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(seed.name)
            .bind(seed.description)
            .bind(seed.required_sessions)
            .bind(seed.required_quizzes)
            .bind(seed.minimum_score)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        }

        let records = sqlx::query_as::<_, CertificationRecord>(select)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(CertificationRecord::to_domain)
            .collect())
    }

    async fn list_user_certifications(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<UserCertification>> {
        let records = sqlx::query_as::<_, UserCertificationRecord>(
            "SELECT id, user_id, certification_id, status, progress_percentage, earned_at, is_approved
             FROM user_certifications WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records
            .into_iter()
            .map(UserCertificationRecord::to_domain)
            .collect()
    }

    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, sender, body, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.session_id)
        .bind(message.sender.to_string())
        .bind(message.body)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_chat_messages(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, session_id, sender, body, created_at
             FROM chat_messages WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records
            .into_iter()
            .map(ChatMessageRecord::to_domain)
            .collect()
    }
}
