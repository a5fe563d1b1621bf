//! crates/therapy_core/src/lifecycle.rs
//!
//! The session lifecycle policy: a single transition table over
//! `SessionStatus` plus the decision functions for each client, doctor,
//! and admin action. Handlers never compare status strings themselves;
//! every mutation is validated here first.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::certification::{self, PASSING_SCORE};
use crate::domain::{Certification, ClientProfile, Session, SessionKind, SessionStatus};

/// Summary written to a session a client ended without taking the quiz.
pub const QUIZ_SKIPPED_SUMMARY: &str = "Session ended before the reflection quiz was taken";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot move a {from} session to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("a meeting URL must be set before starting a human session")]
    MeetingUrlRequired,
    #[error("quiz score {0} is outside the 0-100 range")]
    ScoreOutOfRange(i16),
    #[error("rating {0} is outside the 1-5 range")]
    RatingOutOfRange(i16),
}

impl SessionStatus {
    /// The central transition table. Everything not listed here is illegal.
    pub fn can_move_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Pending, InProgress)
                | (Scheduled, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Scheduled, Cancelled)
                | (InProgress, Cancelled)
                | (Completed, PendingApproval)
                | (PendingApproval, Completed)
        )
    }

    /// Terminal states admit no client- or doctor-driven transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Cancelled)
    }
}

fn check(from: SessionStatus, to: SessionStatus) -> Result<(), LifecycleError> {
    if from.can_move_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { from, to })
    }
}

//=========================================================================================
// Booking
//=========================================================================================

/// The status a freshly booked session starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingOutcome {
    pub status: SessionStatus,
    pub needs_assignment: bool,
}

/// A human session booked without a therapist waits for an admin;
/// everything else goes straight onto the calendar.
pub fn booking_outcome(kind: SessionKind, doctor_id: Option<Uuid>) -> BookingOutcome {
    if kind == SessionKind::Human && doctor_id.is_none() {
        BookingOutcome {
            status: SessionStatus::Pending,
            needs_assignment: true,
        }
    } else {
        BookingOutcome {
            status: SessionStatus::Scheduled,
            needs_assignment: false,
        }
    }
}

//=========================================================================================
// Start
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartUpdate {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

/// Moves a session into `in-progress`. Human sessions are refused until a
/// meeting URL exists so the client is never sent into a call with nowhere
/// to go.
pub fn start(session: &Session, now: DateTime<Utc>) -> Result<StartUpdate, LifecycleError> {
    check(session.status, SessionStatus::InProgress)?;
    if session.kind == SessionKind::Human && session.meeting_url.is_none() {
        return Err(LifecycleError::MeetingUrlRequired);
    }
    Ok(StartUpdate {
        session_id: session.id,
        status: SessionStatus::InProgress,
        started_at: now,
    })
}

//=========================================================================================
// Completion
//=========================================================================================

/// What the caller supplied when ending a session.
#[derive(Debug, Clone, Default)]
pub struct CompletionInput {
    pub skipped: bool,
    pub quiz_answers: Option<Vec<String>>,
    pub quiz_score: Option<i16>,
    pub summary: Option<String>,
    pub client_rating: Option<i16>,
    pub doctor_rating: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResultPlan {
    pub client_id: Uuid,
    pub answers: Vec<String>,
    pub score: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterUpdate {
    pub user_id: Uuid,
    pub total_sessions_completed: i32,
    pub total_quizzes_completed: i32,
    pub progress_level: i32,
}

/// Everything the store must persist, in one transaction, when a session
/// ends. Produced by [`complete`]; the session update always happens, the
/// optional parts only when a qualifying quiz came with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPlan {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub ended_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub client_rating: Option<i16>,
    pub doctor_rating: Option<i16>,
    pub quiz: Option<QuizResultPlan>,
    pub counters: Option<CounterUpdate>,
    pub awards: Vec<Uuid>,
}

/// Decides the full outcome of a completion request.
///
/// A skipped session is cancelled with a fixed summary and touches nothing
/// else. A completion with quiz data records the quiz result; only a
/// passing score (>= 70) moves the profile counters and makes the client
/// eligible for new certifications.
pub fn complete(
    session: &Session,
    input: &CompletionInput,
    profile: &ClientProfile,
    definitions: &[Certification],
    already_awarded: &[Uuid],
    now: DateTime<Utc>,
) -> Result<CompletionPlan, LifecycleError> {
    if input.skipped {
        check(session.status, SessionStatus::Cancelled)?;
        return Ok(CompletionPlan {
            session_id: session.id,
            status: SessionStatus::Cancelled,
            ended_at: now,
            summary: Some(QUIZ_SKIPPED_SUMMARY.to_string()),
            client_rating: None,
            doctor_rating: None,
            quiz: None,
            counters: None,
            awards: Vec::new(),
        });
    }

    check(session.status, SessionStatus::Completed)?;

    for rating in [input.client_rating, input.doctor_rating].into_iter().flatten() {
        if !(1..=5).contains(&rating) {
            return Err(LifecycleError::RatingOutOfRange(rating));
        }
    }

    let quiz = match (&input.quiz_answers, input.quiz_score) {
        (Some(answers), Some(score)) => {
            if !(0..=100).contains(&score) {
                return Err(LifecycleError::ScoreOutOfRange(score));
            }
            Some(QuizResultPlan {
                client_id: session.client_id,
                answers: answers.clone(),
                score,
            })
        }
        _ => None,
    };

    let (counters, awards) = match &quiz {
        Some(q) if q.score >= PASSING_SCORE => {
            let sessions = profile.total_sessions_completed + 1;
            let quizzes = profile.total_quizzes_completed + 1;
            let updated = ClientProfile {
                user_id: profile.user_id,
                total_sessions_completed: sessions,
                total_quizzes_completed: quizzes,
                progress_level: certification::progress_level(sessions),
            };
            let awards =
                certification::evaluate_awards(&updated, q.score, definitions, already_awarded);
            (
                Some(CounterUpdate {
                    user_id: updated.user_id,
                    total_sessions_completed: updated.total_sessions_completed,
                    total_quizzes_completed: updated.total_quizzes_completed,
                    progress_level: updated.progress_level,
                }),
                awards,
            )
        }
        _ => (None, Vec::new()),
    };

    Ok(CompletionPlan {
        session_id: session.id,
        status: SessionStatus::Completed,
        ended_at: now,
        summary: input.summary.clone(),
        client_rating: input.client_rating,
        doctor_rating: input.doctor_rating,
        quiz,
        counters,
        awards,
    })
}

//=========================================================================================
// Cancel / Notes / Review
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelUpdate {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub ended_at: DateTime<Utc>,
}

pub fn cancel(session: &Session, now: DateTime<Utc>) -> Result<CancelUpdate, LifecycleError> {
    check(session.status, SessionStatus::Cancelled)?;
    Ok(CancelUpdate {
        session_id: session.id,
        status: SessionStatus::Cancelled,
        ended_at: now,
    })
}

/// A doctor submitting notes sends the completed session to admin review.
pub fn submit_notes(session: &Session) -> Result<SessionStatus, LifecycleError> {
    check(session.status, SessionStatus::PendingApproval)?;
    Ok(SessionStatus::PendingApproval)
}

/// The admin decision closes the review and the session is final.
pub fn finalize_review(session: &Session) -> Result<SessionStatus, LifecycleError> {
    check(session.status, SessionStatus::Completed)?;
    Ok(SessionStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
    }

    fn session(kind: SessionKind, status: SessionStatus) -> Session {
        Session {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            doctor_id: None,
            kind,
            status,
            scheduled_at: Some(ts()),
            started_at: None,
            ended_at: None,
            topic: None,
            summary: None,
            notes: None,
            meeting_url: None,
            client_rating: None,
            doctor_rating: None,
            created_at: ts(),
        }
    }

    fn empty_profile(user_id: Uuid) -> ClientProfile {
        ClientProfile {
            user_id,
            total_sessions_completed: 0,
            total_quizzes_completed: 0,
            progress_level: 1,
        }
    }

    #[test]
    fn human_booking_without_doctor_waits_for_assignment() {
        let outcome = booking_outcome(SessionKind::Human, None);
        assert_eq!(outcome.status, SessionStatus::Pending);
        assert!(outcome.needs_assignment);
    }

    #[test]
    fn booking_with_doctor_or_ai_is_scheduled() {
        let with_doctor = booking_outcome(SessionKind::Human, Some(Uuid::new_v4()));
        assert_eq!(with_doctor.status, SessionStatus::Scheduled);
        assert!(!with_doctor.needs_assignment);

        let ai = booking_outcome(SessionKind::Ai, None);
        assert_eq!(ai.status, SessionStatus::Scheduled);
        assert!(!ai.needs_assignment);
    }

    #[test]
    fn start_refuses_human_session_without_meeting_url() {
        let s = session(SessionKind::Human, SessionStatus::Scheduled);
        assert_eq!(start(&s, ts()), Err(LifecycleError::MeetingUrlRequired));
    }

    #[test]
    fn start_allows_human_session_with_meeting_url() {
        let mut s = session(SessionKind::Human, SessionStatus::Scheduled);
        s.meeting_url = Some("https://meet.example/room".to_string());
        let update = start(&s, ts()).unwrap();
        assert_eq!(update.status, SessionStatus::InProgress);
        assert_eq!(update.started_at, ts());
    }

    #[test]
    fn start_allows_ai_session_without_meeting_url() {
        let s = session(SessionKind::Ai, SessionStatus::Scheduled);
        assert!(start(&s, ts()).is_ok());
    }

    #[test]
    fn completed_session_cannot_be_completed_again() {
        let s = session(SessionKind::Ai, SessionStatus::Completed);
        let err = complete(
            &s,
            &CompletionInput::default(),
            &empty_profile(s.client_id),
            &[],
            &[],
            ts(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: SessionStatus::Completed,
                to: SessionStatus::Completed,
            }
        );
    }

    #[test]
    fn skipped_completion_cancels_without_quiz_or_counters() {
        let s = session(SessionKind::Ai, SessionStatus::InProgress);
        let input = CompletionInput {
            skipped: true,
            quiz_answers: Some(vec!["a".into()]),
            quiz_score: Some(90),
            ..Default::default()
        };
        let plan = complete(&s, &input, &empty_profile(s.client_id), &[], &[], ts()).unwrap();
        assert_eq!(plan.status, SessionStatus::Cancelled);
        assert_eq!(plan.summary.as_deref(), Some(QUIZ_SKIPPED_SUMMARY));
        assert!(plan.quiz.is_none());
        assert!(plan.counters.is_none());
        assert!(plan.awards.is_empty());
    }

    #[test]
    fn passing_quiz_moves_both_counters_and_progress_level() {
        let s = session(SessionKind::Ai, SessionStatus::InProgress);
        let input = CompletionInput {
            quiz_answers: Some(vec!["calm".into(), "breathing".into()]),
            quiz_score: Some(85),
            ..Default::default()
        };
        let plan = complete(&s, &input, &empty_profile(s.client_id), &[], &[], ts()).unwrap();
        let counters = plan.counters.unwrap();
        assert_eq!(counters.total_sessions_completed, 1);
        assert_eq!(counters.total_quizzes_completed, 1);
        assert_eq!(counters.progress_level, 1);

        // A second passing completion reaches level 2.
        let profile = ClientProfile {
            user_id: s.client_id,
            total_sessions_completed: 1,
            total_quizzes_completed: 1,
            progress_level: 1,
        };
        let plan = complete(&s, &input, &profile, &[], &[], ts()).unwrap();
        assert_eq!(plan.counters.unwrap().progress_level, 2);
    }

    #[test]
    fn failing_quiz_records_result_but_not_counters() {
        let s = session(SessionKind::Ai, SessionStatus::InProgress);
        let input = CompletionInput {
            quiz_answers: Some(vec!["rushed".into()]),
            quiz_score: Some(55),
            ..Default::default()
        };
        let plan = complete(&s, &input, &empty_profile(s.client_id), &[], &[], ts()).unwrap();
        assert_eq!(plan.quiz.as_ref().unwrap().score, 55);
        assert!(plan.counters.is_none());
    }

    #[test]
    fn completion_rejects_out_of_range_score() {
        let s = session(SessionKind::Ai, SessionStatus::InProgress);
        let input = CompletionInput {
            quiz_answers: Some(vec![]),
            quiz_score: Some(140),
            ..Default::default()
        };
        let err = complete(&s, &input, &empty_profile(s.client_id), &[], &[], ts()).unwrap_err();
        assert_eq!(err, LifecycleError::ScoreOutOfRange(140));
    }

    #[test]
    fn cancelled_is_terminal() {
        let s = session(SessionKind::Human, SessionStatus::Cancelled);
        assert!(cancel(&s, ts()).is_err());
        assert!(start(&s, ts()).is_err());
        assert!(SessionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn notes_and_review_round_trip() {
        let completed = session(SessionKind::Human, SessionStatus::Completed);
        assert_eq!(
            submit_notes(&completed).unwrap(),
            SessionStatus::PendingApproval
        );

        let in_review = session(SessionKind::Human, SessionStatus::PendingApproval);
        assert_eq!(finalize_review(&in_review).unwrap(), SessionStatus::Completed);

        // Notes cannot be submitted twice in a row.
        assert!(submit_notes(&in_review).is_err());
    }
}
