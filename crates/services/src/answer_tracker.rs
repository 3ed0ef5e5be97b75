//! Persists answer, review-flag, and timing mutations for a session's attempts.
//!
//! Every mutation writes the complete attempt record back through an upsert
//! and recomputes `attempt_order` from the session's canonical question list,
//! never from the stored value.

use std::sync::Arc;

use exam_core::model::{
    Attempt, AttemptKey, AttemptStatus, QuestionId, SessionId, UserAnswer, attempt_order,
};
use storage::repository::{AttemptRepository, StorageError};

/// Tracks one session's attempts. The attempt set is fixed at session
/// creation, so mutations for question ids outside the canonical list are
/// ignored rather than treated as errors.
pub struct AnswerTracker {
    session_id: SessionId,
    canonical: Vec<QuestionId>,
    attempts: Arc<dyn AttemptRepository>,
}

impl AnswerTracker {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        canonical: Vec<QuestionId>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            session_id,
            canonical,
            attempts,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.canonical.len()
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.canonical
    }

    /// Record the user's answer for a question. Passing `None` clears a
    /// previously recorded answer.
    ///
    /// Returns the persisted attempt, or `None` when the question is not part
    /// of this session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the read or write fails.
    pub async fn record_answer(
        &self,
        question_id: &QuestionId,
        answer: Option<UserAnswer>,
    ) -> Result<Option<Attempt>, StorageError> {
        self.mutate(question_id, |attempt| {
            attempt.status = if answer.is_some() {
                AttemptStatus::Answered
            } else {
                AttemptStatus::Visited
            };
            attempt.user_answer = answer;
        })
        .await
    }

    /// Mark a question as visited. Only promotes from `Unvisited`; an answered
    /// question stays answered when revisited.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the read or write fails.
    pub async fn record_visit(
        &self,
        question_id: &QuestionId,
    ) -> Result<Option<Attempt>, StorageError> {
        self.mutate(question_id, |attempt| {
            if attempt.status == AttemptStatus::Unvisited {
                attempt.status = AttemptStatus::Visited;
            }
        })
        .await
    }

    /// Set or clear the review flag for a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the read or write fails.
    pub async fn set_marked_for_review(
        &self,
        question_id: &QuestionId,
        marked: bool,
    ) -> Result<Option<Attempt>, StorageError> {
        self.mutate(question_id, |attempt| {
            attempt.marked_for_review = marked;
        })
        .await
    }

    /// Add elapsed seconds to a question's running total. Accumulates across
    /// repeated visits.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the read or write fails.
    pub async fn add_time_spent(
        &self,
        question_id: &QuestionId,
        delta_seconds: u32,
    ) -> Result<Option<Attempt>, StorageError> {
        self.mutate(question_id, |attempt| {
            attempt.time_spent_seconds = attempt.time_spent_seconds.saturating_add(delta_seconds);
        })
        .await
    }

    async fn mutate<F>(
        &self,
        question_id: &QuestionId,
        apply: F,
    ) -> Result<Option<Attempt>, StorageError>
    where
        F: FnOnce(&mut Attempt),
    {
        let Some(order) = attempt_order(&self.canonical, question_id) else {
            tracing::debug!(
                session_id = %self.session_id,
                question_id = %question_id,
                "mutation for question outside the session, ignoring"
            );
            return Ok(None);
        };

        let key = AttemptKey::new(self.session_id.clone(), question_id.clone());
        let mut attempt = match self.attempts.get_attempt(&key).await {
            Ok(attempt) => attempt,
            // Membership is fixed at session creation; a missing row means
            // the caller is outside this session, not a tracker bug.
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        apply(&mut attempt);
        attempt.attempt_order = order;
        attempt.is_synced = false;

        self.attempts.upsert_attempt(&attempt).await?;
        Ok(Some(attempt))
    }
}

#[cfg(test)]
mod tests {
    use storage::repository::Storage;

    use super::*;

    fn ids(raw: &[&str]) -> Vec<QuestionId> {
        raw.iter().map(|s| QuestionId::new(*s)).collect()
    }

    async fn seed(storage: &Storage, session_id: &SessionId, canonical: &[QuestionId]) {
        for (i, qid) in canonical.iter().enumerate() {
            let attempt = Attempt::new(
                session_id.clone(),
                qid.clone(),
                u32::try_from(i + 1).unwrap(),
            );
            storage.attempts.upsert_attempt(&attempt).await.unwrap();
        }
        // Seeded rows start clean so tests observe the dirty flag flipping.
        let keys: Vec<AttemptKey> = canonical
            .iter()
            .map(|qid| AttemptKey::new(session_id.clone(), qid.clone()))
            .collect();
        storage.attempts.mark_attempts_synced(&keys).await.unwrap();
    }

    #[tokio::test]
    async fn answering_sets_status_and_marks_dirty() {
        let storage = Storage::in_memory();
        let session_id = SessionId::new("s1");
        let canonical = ids(&["q1", "q2"]);
        seed(&storage, &session_id, &canonical).await;

        let tracker = AnswerTracker::new(session_id.clone(), canonical, storage.attempts.clone());
        let updated = tracker
            .record_answer(&QuestionId::new("q2"), Some(UserAnswer::Selection(vec![1])))
            .await
            .unwrap()
            .expect("q2 belongs to the session");

        assert_eq!(updated.status, AttemptStatus::Answered);
        assert_eq!(updated.attempt_order, 2);
        assert!(!updated.is_synced);

        let stored = storage
            .attempts
            .get_attempt(&AttemptKey::new(session_id, QuestionId::new("q2")))
            .await
            .unwrap();
        assert_eq!(stored.user_answer, Some(UserAnswer::Selection(vec![1])));
        assert!(!stored.is_synced);
    }

    #[tokio::test]
    async fn clearing_an_answer_reverts_to_visited() {
        let storage = Storage::in_memory();
        let session_id = SessionId::new("s1");
        let canonical = ids(&["q1"]);
        seed(&storage, &session_id, &canonical).await;

        let tracker = AnswerTracker::new(session_id, canonical, storage.attempts.clone());
        let qid = QuestionId::new("q1");
        tracker
            .record_answer(&qid, Some(UserAnswer::Text("42".into())))
            .await
            .unwrap();
        let cleared = tracker.record_answer(&qid, None).await.unwrap().unwrap();

        assert_eq!(cleared.status, AttemptStatus::Visited);
        assert!(cleared.user_answer.is_none());
    }

    #[tokio::test]
    async fn time_spent_accumulates_across_visits() {
        let storage = Storage::in_memory();
        let session_id = SessionId::new("s1");
        let canonical = ids(&["q1"]);
        seed(&storage, &session_id, &canonical).await;

        let tracker = AnswerTracker::new(session_id, canonical, storage.attempts.clone());
        let qid = QuestionId::new("q1");
        tracker.add_time_spent(&qid, 7).await.unwrap();
        let updated = tracker.add_time_spent(&qid, 5).await.unwrap().unwrap();

        assert_eq!(updated.time_spent_seconds, 12);
    }

    #[tokio::test]
    async fn unknown_question_is_ignored() {
        let storage = Storage::in_memory();
        let session_id = SessionId::new("s1");
        let canonical = ids(&["q1"]);
        seed(&storage, &session_id, &canonical).await;

        let tracker = AnswerTracker::new(session_id, canonical, storage.attempts.clone());
        let result = tracker
            .record_answer(&QuestionId::new("ghost"), Some(UserAnswer::Text("1".into())))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn visit_does_not_demote_answered() {
        let storage = Storage::in_memory();
        let session_id = SessionId::new("s1");
        let canonical = ids(&["q1"]);
        seed(&storage, &session_id, &canonical).await;

        let tracker = AnswerTracker::new(session_id, canonical, storage.attempts.clone());
        let qid = QuestionId::new("q1");
        tracker
            .record_answer(&qid, Some(UserAnswer::Selection(vec![0])))
            .await
            .unwrap();
        let revisited = tracker.record_visit(&qid).await.unwrap().unwrap();

        assert_eq!(revisited.status, AttemptStatus::Answered);
    }
}
