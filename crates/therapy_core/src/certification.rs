//! crates/therapy_core/src/certification.rs
//!
//! The certification evaluator: progress-level arithmetic, the default
//! certification set, and the threshold check deciding which credentials a
//! client unlocks after a qualifying quiz.

use uuid::Uuid;

use crate::domain::{Certification, ClientProfile};

/// Minimum quiz score that counts toward progress counters.
pub const PASSING_SCORE: i16 = 70;

/// Progress levels are earned two completed sessions at a time, capped at 5.
pub fn progress_level(total_sessions_completed: i32) -> i32 {
    (total_sessions_completed / 2 + 1).min(5)
}

/// A certification definition before it has an id assigned by the store.
#[derive(Debug, Clone)]
pub struct CertificationSeed {
    pub name: &'static str,
    pub description: &'static str,
    pub required_sessions: i32,
    pub required_quizzes: i32,
    pub minimum_score: i16,
}

/// The certifications provisioned when none exist yet.
pub fn default_certifications() -> Vec<CertificationSeed> {
    vec![
        CertificationSeed {
            name: "Mindfulness Foundations",
            description: "Completed a first guided session and reflection quiz.",
            required_sessions: 1,
            required_quizzes: 1,
            minimum_score: 70,
        },
        CertificationSeed {
            name: "Anxiety Management Basics",
            description: "Demonstrated consistent practice across early sessions.",
            required_sessions: 2,
            required_quizzes: 2,
            minimum_score: 80,
        },
        CertificationSeed {
            name: "Resilience Practitioner",
            description: "Sustained engagement with advanced reflection scores.",
            required_sessions: 5,
            required_quizzes: 5,
            minimum_score: 85,
        },
    ]
}

/// Returns the ids of every certification the client newly qualifies for.
///
/// All three thresholds must hold at once: accumulated sessions,
/// accumulated quizzes, and the score of the quiz that triggered the
/// evaluation. Certifications already held are never re-awarded.
pub fn evaluate_awards(
    profile: &ClientProfile,
    latest_score: i16,
    definitions: &[Certification],
    already_awarded: &[Uuid],
) -> Vec<Uuid> {
    definitions
        .iter()
        .filter(|cert| !already_awarded.contains(&cert.id))
        .filter(|cert| {
            profile.total_sessions_completed >= cert.required_sessions
                && profile.total_quizzes_completed >= cert.required_quizzes
                && latest_score >= cert.minimum_score
        })
        .map(|cert| cert.id)
        .collect()
}

/// Percentage progress toward an unearned certification, from the two
/// counters the client can accumulate ahead of time.
pub fn progress_percentage(cert: &Certification, profile: &ClientProfile) -> i16 {
    fn fraction(have: i32, need: i32) -> f64 {
        if need <= 0 {
            1.0
        } else {
            (have as f64 / need as f64).min(1.0)
        }
    }
    let sessions = fraction(profile.total_sessions_completed, cert.required_sessions);
    let quizzes = fraction(profile.total_quizzes_completed, cert.required_quizzes);
    ((sessions + quizzes) / 2.0 * 100.0).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(sessions: i32, quizzes: i32) -> ClientProfile {
        ClientProfile {
            user_id: Uuid::new_v4(),
            total_sessions_completed: sessions,
            total_quizzes_completed: quizzes,
            progress_level: progress_level(sessions),
        }
    }

    fn cert(required_sessions: i32, required_quizzes: i32, minimum_score: i16) -> Certification {
        Certification {
            id: Uuid::new_v4(),
            name: "Anxiety Management Basics".to_string(),
            description: String::new(),
            required_sessions,
            required_quizzes,
            minimum_score,
        }
    }

    #[test]
    fn progress_level_climbs_every_two_sessions_and_caps_at_five() {
        assert_eq!(progress_level(0), 1);
        assert_eq!(progress_level(1), 1);
        assert_eq!(progress_level(2), 2);
        assert_eq!(progress_level(3), 2);
        assert_eq!(progress_level(8), 5);
        assert_eq!(progress_level(100), 5);
    }

    #[test]
    fn award_requires_all_three_thresholds_at_once() {
        let c = cert(2, 2, 80);
        let defs = vec![c.clone()];

        // Enough sessions and quizzes, score too low.
        assert!(evaluate_awards(&profile(2, 2), 75, &defs, &[]).is_empty());
        // Score high enough, one quiz short.
        assert!(evaluate_awards(&profile(2, 1), 90, &defs, &[]).is_empty());
        // All thresholds met.
        assert_eq!(evaluate_awards(&profile(2, 2), 85, &defs, &[]), vec![c.id]);
    }

    #[test]
    fn awarded_certifications_are_never_granted_twice() {
        let c = cert(1, 1, 70);
        let defs = vec![c.clone()];
        assert!(evaluate_awards(&profile(4, 4), 95, &defs, &[c.id]).is_empty());
    }

    #[test]
    fn several_certifications_can_unlock_on_one_quiz() {
        let first = cert(1, 1, 70);
        let second = cert(2, 2, 80);
        let defs = vec![first.clone(), second.clone()];
        let awards = evaluate_awards(&profile(2, 2), 85, &defs, &[]);
        assert_eq!(awards, vec![first.id, second.id]);
    }

    #[test]
    fn progress_percentage_averages_the_two_counters() {
        let c = cert(4, 2, 80);
        // 2/4 sessions and 1/2 quizzes -> 50%.
        assert_eq!(progress_percentage(&c, &profile(2, 1)), 50);
        // Overshooting a counter does not push past 100.
        assert_eq!(progress_percentage(&c, &profile(10, 10)), 100);
    }

    #[test]
    fn default_set_contains_the_entry_level_path() {
        let defaults = default_certifications();
        assert_eq!(defaults.len(), 3);
        let basics = defaults
            .iter()
            .find(|c| c.name == "Anxiety Management Basics")
            .unwrap();
        assert_eq!(basics.required_sessions, 2);
        assert_eq!(basics.required_quizzes, 2);
        assert_eq!(basics.minimum_score, 80);
    }
}
