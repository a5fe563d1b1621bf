//! crates/therapy_core/src/assignment.rs
//!
//! The assignment policy: which sessions need an admin to pick a
//! therapist, and which doctors are allowed to receive one.

use uuid::Uuid;

use crate::domain::{Role, Session, SessionKind, SessionStatus, User};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("user is not a doctor")]
    NotADoctor,
    #[error("doctor account is deactivated")]
    DoctorInactive,
    #[error("doctor has not been approved yet")]
    DoctorNotApproved,
    #[error("session already has a doctor assigned")]
    AlreadyAssigned,
    #[error("a {0} session cannot receive a doctor")]
    SessionNotAssignable(SessionStatus),
}

/// A human session booked without a specific therapist awaits admin action.
pub fn needs_assignment(kind: SessionKind, doctor_id: Option<Uuid>) -> bool {
    kind == SessionKind::Human && doctor_id.is_none()
}

/// Only active, approved doctor accounts may be assigned to a session.
pub fn validate_assignee(doctor: &User) -> Result<(), AssignmentError> {
    if doctor.role != Role::Doctor {
        return Err(AssignmentError::NotADoctor);
    }
    if !doctor.is_active {
        return Err(AssignmentError::DoctorInactive);
    }
    if !doctor.is_approved {
        return Err(AssignmentError::DoctorNotApproved);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentUpdate {
    pub session_id: Uuid,
    pub doctor_id: Uuid,
    /// Set when the assignment also moves a pending session onto the
    /// calendar. The caller logs this flip.
    pub new_status: Option<SessionStatus>,
}

/// Assigns a doctor to a session awaiting one. A pending session becomes
/// scheduled at the same time, honoring the rule that an assigned session
/// is never left waiting.
pub fn assign(session: &Session, doctor: &User) -> Result<AssignmentUpdate, AssignmentError> {
    validate_assignee(doctor)?;
    if session.doctor_id.is_some() {
        return Err(AssignmentError::AlreadyAssigned);
    }
    let new_status = match session.status {
        SessionStatus::Pending => Some(SessionStatus::Scheduled),
        SessionStatus::Scheduled => None,
        other => return Err(AssignmentError::SessionNotAssignable(other)),
    };
    Ok(AssignmentUpdate {
        session_id: session.id,
        doctor_id: doctor.id,
        new_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doctor(active: bool, approved: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "doc@example.com".to_string(),
            display_name: "Dr. Example".to_string(),
            role: Role::Doctor,
            is_active: active,
            is_approved: approved,
            created_at: Utc::now(),
        }
    }

    fn pending_session() -> Session {
        Session {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            doctor_id: None,
            kind: SessionKind::Human,
            status: SessionStatus::Pending,
            scheduled_at: Some(Utc::now()),
            started_at: None,
            ended_at: None,
            topic: None,
            summary: None,
            notes: None,
            meeting_url: None,
            client_rating: None,
            doctor_rating: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_unassigned_human_sessions_need_assignment() {
        assert!(needs_assignment(SessionKind::Human, None));
        assert!(!needs_assignment(SessionKind::Human, Some(Uuid::new_v4())));
        assert!(!needs_assignment(SessionKind::Ai, None));
    }

    #[test]
    fn inactive_or_unapproved_doctor_is_refused() {
        assert_eq!(
            validate_assignee(&doctor(false, true)),
            Err(AssignmentError::DoctorInactive)
        );
        assert_eq!(
            validate_assignee(&doctor(true, false)),
            Err(AssignmentError::DoctorNotApproved)
        );
        assert!(validate_assignee(&doctor(true, true)).is_ok());
    }

    #[test]
    fn non_doctor_cannot_be_assigned() {
        let mut admin = doctor(true, true);
        admin.role = Role::Admin;
        assert_eq!(
            assign(&pending_session(), &admin),
            Err(AssignmentError::NotADoctor)
        );
    }

    #[test]
    fn assignment_schedules_a_pending_session() {
        let update = assign(&pending_session(), &doctor(true, true)).unwrap();
        assert_eq!(update.new_status, Some(SessionStatus::Scheduled));
    }

    #[test]
    fn assignment_refuses_sessions_already_underway() {
        let mut s = pending_session();
        s.status = SessionStatus::InProgress;
        assert_eq!(
            assign(&s, &doctor(true, true)),
            Err(AssignmentError::SessionNotAssignable(
                SessionStatus::InProgress
            ))
        );
    }
}
