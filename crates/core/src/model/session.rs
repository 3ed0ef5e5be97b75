use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grading::SessionTotals;
use crate::model::SessionId;

/// Persisted lifecycle state of a test session.
///
/// `submitting` is deliberately not a persisted value: the orchestrator
/// layers it on top as a transient in-memory phase, so a crash mid-submit
/// resumes from `InProgress` rather than a half-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Ready,
    /// Part of the persisted-status vocabulary for hosts that record an
    /// explicit in-progress phase; the engine itself only ever writes
    /// `Ready` and `Completed`.
    InProgress,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Ready => "ready",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

/// One timed test-taking instance over a fixed ordered list of questions.
///
/// Created once at test start; the timer mutates `remaining_time_seconds`,
/// grading writes the result fields, and the sync coordinator owns
/// `is_synced`. Never deleted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSession {
    pub id: SessionId,
    pub status: SessionStatus,
    /// Integer seconds, monotonically non-increasing while in progress.
    pub remaining_time_seconds: u32,
    pub score: f64,
    pub accuracy: f64,
    pub correct_count: u32,
    pub attempted_count: u32,
    /// Set once at completion, immutable after.
    pub completed_at: Option<DateTime<Utc>>,
    /// False whenever the remote copy is stale.
    pub is_synced: bool,
}

impl TestSession {
    #[must_use]
    pub fn new(id: SessionId, duration_seconds: u32) -> Self {
        Self {
            id,
            status: SessionStatus::Ready,
            remaining_time_seconds: duration_seconds,
            score: 0.0,
            accuracy: 0.0,
            correct_count: 0,
            attempted_count: 0,
            completed_at: None,
            is_synced: false,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Writes graded totals into the session and moves it to `Completed`.
    ///
    /// `completed_at` is set only on the first completion; re-applying totals
    /// never rewrites the timestamp.
    pub fn apply_totals(&mut self, totals: &SessionTotals, completed_at: DateTime<Utc>) {
        self.score = totals.total_score;
        self.accuracy = totals.accuracy;
        self.correct_count = totals.correct_count;
        self.attempted_count = totals.attempted_count;
        self.status = SessionStatus::Completed;
        if self.completed_at.is_none() {
            self.completed_at = Some(completed_at);
        }
        self.is_synced = false;
    }
}
