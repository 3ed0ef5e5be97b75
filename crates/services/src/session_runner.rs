//! Single-owner orchestrator for one in-progress test session.
//!
//! All mutations to a session's attempts and timer flow through this runner.
//! Navigation commits the elapsed time of the question being left before the
//! cursor moves; the cursor itself holds no timing state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use exam_core::cursor::Cursor;
use exam_core::grading::grade;
use exam_core::model::{
    Attempt, AttemptStatus, Question, QuestionId, SessionId, TagClassifier, TestSession,
    UserAnswer,
};
use exam_core::time::Clock;
use storage::repository::{
    AttemptRepository, QuestionRepository, SessionRepository, Storage, StorageError,
    TestTransaction,
};

use crate::answer_tracker::AnswerTracker;
use crate::error::TestRunError;
use crate::remote::RemoteStore;
use crate::sync::{HeartbeatHandle, SyncCoordinator};
use crate::timer::{SessionTimer, TimerEvent};

/// Result of a submission request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Grading ran and the results were persisted.
    Completed(TestSession),
    /// The session was already completed; grading did not run again.
    AlreadyCompleted(TestSession),
}

impl SubmitOutcome {
    #[must_use]
    pub fn session(&self) -> &TestSession {
        match self {
            Self::Completed(s) | Self::AlreadyCompleted(s) => s,
        }
    }
}

/// Result of advancing the session clock by one second.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Running { remaining: u32 },
    /// The timer expired on this tick and the session was submitted.
    Submitted(SubmitOutcome),
    /// The timer had already expired; nothing happened.
    Idle,
}

/// Counts shown while a session is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub marked_for_review: usize,
    pub remaining_time_seconds: u32,
}

/// Drives one test session from load to submission.
pub struct TestRunner {
    clock: Clock,
    session: TestSession,
    questions: Vec<Question>,
    canonical: Vec<QuestionId>,
    cursor: Cursor,
    tracker: AnswerTracker,
    timer: SessionTimer,
    sync: Arc<SyncCoordinator>,
    sessions: Arc<dyn SessionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    transactions: Arc<dyn TestTransaction>,
    entered_current_at: DateTime<Utc>,
}

impl TestRunner {
    /// Create a fresh session over the given questions and load it.
    ///
    /// The session record, the question set, and exactly one attempt per
    /// question are written in a single transaction before the runner starts.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError::Empty` for an empty question list and storage
    /// errors from the initialization transaction.
    pub async fn start(
        storage: &Storage,
        remote: Arc<dyn RemoteStore>,
        questions: Vec<Question>,
        duration_seconds: u32,
        clock: Clock,
    ) -> Result<Self, TestRunError> {
        if questions.is_empty() {
            return Err(TestRunError::Empty);
        }

        let session = TestSession::new(SessionId::generate(), duration_seconds);
        let attempts: Vec<Attempt> = questions
            .iter()
            .enumerate()
            .map(|(i, question)| {
                Attempt::new(
                    session.id.clone(),
                    question.id.clone(),
                    u32::try_from(i + 1).unwrap_or(u32::MAX),
                )
            })
            .collect();
        storage
            .transactions
            .initialize_test_session(&session, &questions, &attempts)
            .await?;

        Self::load(storage, remote, session.id, clock).await
    }

    /// Resume a previously initialized session and position the cursor on its
    /// first question.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError::UnknownSession` when the session id is absent
    /// from local storage and `TestRunError::Empty` when it has no questions.
    pub async fn load(
        storage: &Storage,
        remote: Arc<dyn RemoteStore>,
        session_id: SessionId,
        clock: Clock,
    ) -> Result<Self, TestRunError> {
        let session = match storage.sessions.get_session(&session_id).await {
            Ok(session) => session,
            Err(StorageError::NotFound) => return Err(TestRunError::UnknownSession),
            Err(e) => return Err(e.into()),
        };

        let attempts = storage.attempts.attempts_for_session(&session_id).await?;
        if attempts.is_empty() {
            return Err(TestRunError::Empty);
        }
        let canonical: Vec<QuestionId> = attempts
            .iter()
            .map(|attempt| attempt.question_id.clone())
            .collect();
        let questions = storage.questions.questions_by_ids(&canonical).await?;

        let tracker = AnswerTracker::new(
            session_id.clone(),
            canonical.clone(),
            storage.attempts.clone(),
        );
        let timer = SessionTimer::new(
            session_id.clone(),
            session.remaining_time_seconds,
            storage.sessions.clone(),
        );
        let sync = Arc::new(SyncCoordinator::new(
            session_id,
            canonical.clone(),
            storage.sessions.clone(),
            storage.attempts.clone(),
            remote,
        ));

        let mut runner = Self {
            entered_current_at: clock.now(),
            clock,
            session,
            questions,
            cursor: Cursor::new(canonical.len()),
            canonical,
            tracker,
            timer,
            sync,
            sessions: storage.sessions.clone(),
            attempts: storage.attempts.clone(),
            transactions: storage.transactions.clone(),
        };
        runner.tracker.record_visit(runner.current_question_id()).await?;
        Ok(runner)
    }

    #[must_use]
    pub fn session(&self) -> &TestSession {
        &self.session
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.cursor.current()
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.cursor.current()]
    }

    #[must_use]
    pub fn remaining_time(&self) -> u32 {
        self.timer.remaining()
    }

    fn current_question_id(&self) -> &QuestionId {
        &self.canonical[self.cursor.current()]
    }

    /// Record or clear the answer for the question under the cursor.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError` when the write fails.
    pub async fn answer_current(
        &mut self,
        answer: Option<UserAnswer>,
    ) -> Result<(), TestRunError> {
        let question_id = self.current_question_id().clone();
        self.tracker.record_answer(&question_id, answer).await?;
        Ok(())
    }

    /// Set or clear the review flag on the question under the cursor.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError` when the write fails.
    pub async fn mark_current_for_review(&mut self, marked: bool) -> Result<(), TestRunError> {
        let question_id = self.current_question_id().clone();
        self.tracker
            .set_marked_for_review(&question_id, marked)
            .await?;
        Ok(())
    }

    /// Move to the next question. No-op at the last index.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError` when committing elapsed time fails.
    pub async fn next(&mut self) -> Result<bool, TestRunError> {
        self.commit_elapsed().await?;
        let moved = self.cursor.next();
        if moved {
            self.tracker.record_visit(self.current_question_id()).await?;
        }
        Ok(moved)
    }

    /// Move to the previous question. No-op at the first index.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError` when committing elapsed time fails.
    pub async fn prev(&mut self) -> Result<bool, TestRunError> {
        self.commit_elapsed().await?;
        let moved = self.cursor.prev();
        if moved {
            self.tracker.record_visit(self.current_question_id()).await?;
        }
        Ok(moved)
    }

    /// Jump to an arbitrary question index. Out-of-range indexes are
    /// rejected, not clamped.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError::Cursor` for an out-of-range index.
    pub async fn jump_to(&mut self, index: usize) -> Result<(), TestRunError> {
        self.commit_elapsed().await?;
        self.cursor.jump_to(index)?;
        self.tracker.record_visit(self.current_question_id()).await?;
        Ok(())
    }

    /// Advance the countdown by one second. When the timer expires, the
    /// session is submitted automatically, exactly once.
    ///
    /// Ticks against a completed session are ignored so a host that keeps
    /// its clock running cannot overwrite the final remaining time.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError` when a checkpoint write or the expiry
    /// submission fails.
    pub async fn tick(&mut self) -> Result<TickOutcome, TestRunError> {
        if self.session.is_completed() {
            return Ok(TickOutcome::Idle);
        }
        match self.timer.tick().await? {
            TimerEvent::Tick { remaining } | TimerEvent::Checkpoint { remaining } => {
                Ok(TickOutcome::Running { remaining })
            }
            TimerEvent::Expired => {
                let outcome = self.submit().await?;
                Ok(TickOutcome::Submitted(outcome))
            }
            TimerEvent::Halted => Ok(TickOutcome::Idle),
        }
    }

    /// Grade the session, persist the results atomically, and run the final
    /// sync.
    ///
    /// If the persisted session is already completed, grading is skipped and
    /// only the final sync is retried.
    ///
    /// # Errors
    ///
    /// Storage and sync errors propagate; a sync failure after the grading
    /// write leaves the session completed locally, and calling `submit` again
    /// retries only the sync.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, TestRunError> {
        let persisted = self.sessions.get_session(&self.session.id).await?;
        if persisted.is_completed() {
            self.session = persisted.clone();
            self.sync.final_sync().await?;
            return Ok(SubmitOutcome::AlreadyCompleted(persisted));
        }

        self.commit_elapsed().await?;
        self.timer.flush().await?;

        let attempts = self.attempts.attempts_for_session(&self.session.id).await?;
        let outcome = grade(&attempts, &self.questions, &TagClassifier);

        let mut session = persisted;
        session.remaining_time_seconds = self.timer.remaining();
        session.apply_totals(&outcome.totals, self.clock.now());

        self.transactions
            .complete_test_session(&session, &outcome.attempts)
            .await?;
        self.session = session.clone();

        self.sync.final_sync().await?;
        Ok(SubmitOutcome::Completed(session))
    }

    /// Start the background sync heartbeat. The first push runs immediately.
    #[must_use]
    pub fn start_heartbeat(&self, period: std::time::Duration) -> HeartbeatHandle {
        Arc::clone(&self.sync).spawn_heartbeat(period)
    }

    /// Commit pending elapsed time and persist the countdown. Called on
    /// teardown so at most a checkpoint interval of state is ever lost.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError` when a write fails.
    pub async fn suspend(&mut self) -> Result<(), TestRunError> {
        self.commit_elapsed().await?;
        self.timer.flush().await?;
        Ok(())
    }

    /// Snapshot of per-status counts for the session.
    ///
    /// # Errors
    ///
    /// Returns `TestRunError` when the attempt read fails.
    pub async fn progress(&self) -> Result<SessionProgress, TestRunError> {
        let attempts = self.attempts.attempts_for_session(&self.session.id).await?;
        Ok(summarize(&attempts, self.timer.remaining()))
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    async fn commit_elapsed(&mut self) -> Result<(), TestRunError> {
        let now = self.clock.now();
        let elapsed = (now - self.entered_current_at).num_seconds();
        self.entered_current_at = now;
        if elapsed > 0 {
            let question_id = self.current_question_id().clone();
            let delta = u32::try_from(elapsed).unwrap_or(u32::MAX);
            self.tracker.add_time_spent(&question_id, delta).await?;
        }
        Ok(())
    }
}

fn summarize(attempts: &[Attempt], remaining_time_seconds: u32) -> SessionProgress {
    let mut progress = SessionProgress {
        total: attempts.len(),
        remaining_time_seconds,
        ..SessionProgress::default()
    };
    for attempt in attempts {
        match attempt.status {
            AttemptStatus::Answered => progress.answered += 1,
            AttemptStatus::Unvisited => progress.unvisited += 1,
            _ => progress.visited += 1,
        }
        if attempt.marked_for_review {
            progress.marked_for_review += 1;
        }
    }
    progress
}

#[cfg(test)]
mod tests {
    use exam_core::model::SessionId;

    use super::*;

    fn attempt(status: AttemptStatus, marked: bool, order: u32) -> Attempt {
        let mut a = Attempt::new(SessionId::new("s1"), QuestionId::new(format!("q{order}")), order);
        a.status = status;
        a.marked_for_review = marked;
        a
    }

    #[test]
    fn progress_counts_by_status_and_flag() {
        let attempts = vec![
            attempt(AttemptStatus::Answered, false, 1),
            attempt(AttemptStatus::Answered, true, 2),
            attempt(AttemptStatus::Visited, true, 3),
            attempt(AttemptStatus::Unvisited, false, 4),
        ];
        let progress = summarize(&attempts, 120);

        assert_eq!(progress.total, 4);
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.visited, 1);
        assert_eq!(progress.unvisited, 1);
        assert_eq!(progress.marked_for_review, 2);
        assert_eq!(progress.remaining_time_seconds, 120);
    }
}
