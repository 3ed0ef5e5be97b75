use serde::{Deserialize, Serialize};

use crate::model::{AttemptKey, QuestionId, SessionId};

/// Interaction state of an attempt.
///
/// `Unvisited` through `MarkedForReview` track navigation and are passed
/// through by the engine; `Correct`, `Incorrect` and `Skipped` are assigned
/// by grading at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Unvisited,
    Visited,
    Answered,
    MarkedForReview,
    Correct,
    Incorrect,
    Skipped,
}

impl AttemptStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Unvisited => "unvisited",
            AttemptStatus::Visited => "visited",
            AttemptStatus::Answered => "answered",
            AttemptStatus::MarkedForReview => "marked_for_review",
            AttemptStatus::Correct => "correct",
            AttemptStatus::Incorrect => "incorrect",
            AttemptStatus::Skipped => "skipped",
        }
    }
}

/// A user's recorded answer. Selections carry option indices; numerical
/// entry carries the raw text. Untagged so the serialized form mirrors the
/// content source (array vs. string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserAnswer {
    Selection(Vec<u32>),
    Text(String),
}

impl UserAnswer {
    /// Coerces to a sorted collection of option indices for deep equality
    /// against the keyed answer. Text answers have no indices.
    #[must_use]
    pub fn selection(&self) -> Vec<u32> {
        match self {
            UserAnswer::Selection(is) => {
                let mut out = is.clone();
                out.sort_unstable();
                out
            }
            UserAnswer::Text(_) => Vec::new(),
        }
    }

    /// Normalized string form for exact numerical comparison.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            UserAnswer::Selection(is) => is
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            UserAnswer::Text(s) => s.trim().to_owned(),
        }
    }
}

/// The mutable per-question record of a user's interaction within a session.
///
/// The set of attempts for a session is fixed at creation, one per question
/// in the canonical list, and never grows or shrinks. Every mutation is a
/// full-record upsert keyed by `(session_id, question_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub user_answer: Option<UserAnswer>,
    pub status: AttemptStatus,
    pub marked_for_review: bool,
    /// Accumulated across visits; never replaced.
    pub time_spent_seconds: u32,
    /// 1-based position in the session's canonical question list. Recomputed
    /// from that list at every persistence point, never trusted from stale
    /// state.
    pub attempt_order: u32,
    pub score: f64,
    /// None until graded.
    pub is_correct: Option<bool>,
    pub is_synced: bool,
}

impl Attempt {
    /// Fresh unvisited attempt, created once per question at session start.
    #[must_use]
    pub fn new(session_id: SessionId, question_id: QuestionId, attempt_order: u32) -> Self {
        Self {
            session_id,
            question_id,
            user_answer: None,
            status: AttemptStatus::Unvisited,
            marked_for_review: false,
            time_spent_seconds: 0,
            attempt_order,
            score: 0.0,
            is_correct: None,
            is_synced: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> AttemptKey {
        AttemptKey::new(self.session_id.clone(), self.question_id.clone())
    }
}

/// 1-based position of `id` within the canonical question list, or `None`
/// when the question is not part of the session.
///
/// This is the single definition of `attempt_order`: every component that
/// persists or ships an attempt must derive the order here so any two of
/// them agree given the same list.
#[must_use]
pub fn attempt_order(canonical: &[QuestionId], id: &QuestionId) -> Option<u32> {
    canonical
        .iter()
        .position(|q| q == id)
        .and_then(|i| u32::try_from(i + 1).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_one_based_and_stable() {
        let canonical = vec![
            QuestionId::new("q1"),
            QuestionId::new("q2"),
            QuestionId::new("q3"),
        ];
        assert_eq!(attempt_order(&canonical, &QuestionId::new("q1")), Some(1));
        assert_eq!(attempt_order(&canonical, &QuestionId::new("q3")), Some(3));
        assert_eq!(attempt_order(&canonical, &QuestionId::new("q9")), None);
    }

    #[test]
    fn user_answer_selection_is_sorted() {
        let answer = UserAnswer::Selection(vec![2, 0, 1]);
        assert_eq!(answer.selection(), vec![0, 1, 2]);
        assert!(UserAnswer::Text("42".into()).selection().is_empty());
    }

    #[test]
    fn user_answer_text_is_trimmed() {
        assert_eq!(UserAnswer::Text("  42\n".into()).text(), "42");
    }

    #[test]
    fn new_attempt_is_blank_and_dirty() {
        let attempt = Attempt::new(SessionId::new("s1"), QuestionId::new("q1"), 1);
        assert_eq!(attempt.status, AttemptStatus::Unvisited);
        assert!(attempt.user_answer.is_none());
        assert_eq!(attempt.time_spent_seconds, 0);
        assert!(attempt.is_correct.is_none());
        assert!(!attempt.is_synced);
    }
}
