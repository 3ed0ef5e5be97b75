use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use exam_core::model::{Attempt, AttemptKey, Question, QuestionId, SessionId, TestSession};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for the immutable question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Bulk upsert from the content source. Overwrite-by-key and idempotent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch cannot be stored.
    async fn upsert_questions(&self, questions: &[Question]) -> Result<(), StorageError>;

    /// Fetch a single question by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: &QuestionId) -> Result<Question, StorageError>;

    /// Fetch questions by ids, preserving the requested (canonical) order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any are missing.
    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;

    /// All questions for a topic, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query failure.
    async fn questions_by_topic(&self, topic: &str) -> Result<Vec<Question>, StorageError>;
}

/// Repository contract for test sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist or update a session (full record).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn upsert_session(&self, session: &TestSession) -> Result<(), StorageError>;

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_session(&self, id: &SessionId) -> Result<TestSession, StorageError>;

    /// Timer checkpoint write: only the countdown field, nothing else.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn update_remaining_time(
        &self,
        id: &SessionId,
        remaining_seconds: u32,
    ) -> Result<(), StorageError>;

    /// Clears the session's dirty flag after a remote acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn mark_session_synced(&self, id: &SessionId) -> Result<(), StorageError>;

    /// All sessions whose remote copy is stale.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query failure.
    async fn unsynced_sessions(&self) -> Result<Vec<TestSession>, StorageError>;
}

/// Repository contract for attempts, keyed by `(session_id, question_id)`.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Full-record upsert; callers always supply the complete merged record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn upsert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError>;

    /// Fetch one attempt by its composite key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_attempt(&self, key: &AttemptKey) -> Result<Attempt, StorageError>;

    /// All attempts for a session, ordered by `attempt_order`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query failure.
    async fn attempts_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Attempt>, StorageError>;

    /// Dirty attempts for a session, ordered by `attempt_order`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query failure.
    async fn unsynced_attempts(&self, session_id: &SessionId)
    -> Result<Vec<Attempt>, StorageError>;

    /// Clears dirty flags for exactly the given keys. Records that became
    /// dirty after a sync batch was read keep their flag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failure. Unknown keys are skipped.
    async fn mark_attempts_synced(&self, keys: &[AttemptKey]) -> Result<(), StorageError>;
}

/// Atomic multi-collection writes. Either every record in the call is
/// persisted and visible together, or none are; callers retry the whole
/// transaction on failure.
#[async_trait]
pub trait TestTransaction: Send + Sync {
    /// Writes the session, its question snapshot and exactly one attempt per
    /// question in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` with no partial state left behind.
    async fn initialize_test_session(
        &self,
        session: &TestSession,
        questions: &[Question],
        attempts: &[Attempt],
    ) -> Result<(), StorageError>;

    /// Writes graded attempts together with the session's transition to
    /// completed, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` with no partial state left behind.
    async fn complete_test_session(
        &self,
        session: &TestSession,
        attempts: &[Attempt],
    ) -> Result<(), StorageError>;
}

#[derive(Default)]
struct InMemoryState {
    questions: HashMap<QuestionId, Question>,
    sessions: HashMap<SessionId, TestSession>,
    attempts: BTreeMap<AttemptKey, Attempt>,
}

/// In-memory implementation for tests and prototyping.
///
/// A single mutex spans all three collections, which is what makes the
/// transactional writes atomic with respect to readers. The map inserts
/// behind it are infallible, so a transactional write here cannot fail
/// partway; only the sqlite backend exercises rollback.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        for question in questions {
            guard
                .questions
                .insert(question.id.clone(), question.clone());
        }
        Ok(())
    }

    async fn get_question(&self, id: &QuestionId) -> Result<Question, StorageError> {
        let guard = self.lock()?;
        guard.questions.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match guard.questions.get(id) {
                Some(question) => out.push(question.clone()),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(out)
    }

    async fn questions_by_topic(&self, topic: &str) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<Question> = guard
            .questions
            .values()
            .filter(|q| q.topic == topic)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn upsert_session(&self, session: &TestSession) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<TestSession, StorageError> {
        let guard = self.lock()?;
        guard.sessions.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn update_remaining_time(
        &self,
        id: &SessionId,
        remaining_seconds: u32,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let session = guard.sessions.get_mut(id).ok_or(StorageError::NotFound)?;
        session.remaining_time_seconds = remaining_seconds;
        Ok(())
    }

    async fn mark_session_synced(&self, id: &SessionId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let session = guard.sessions.get_mut(id).ok_or(StorageError::NotFound)?;
        session.is_synced = true;
        Ok(())
    }

    async fn unsynced_sessions(&self) -> Result<Vec<TestSession>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<TestSession> = guard
            .sessions
            .values()
            .filter(|s| !s.is_synced)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn upsert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.attempts.insert(attempt.key(), attempt.clone());
        Ok(())
    }

    async fn get_attempt(&self, key: &AttemptKey) -> Result<Attempt, StorageError> {
        let guard = self.lock()?;
        guard.attempts.get(key).cloned().ok_or(StorageError::NotFound)
    }

    async fn attempts_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Attempt>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<Attempt> = guard
            .attempts
            .values()
            .filter(|a| &a.session_id == session_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.attempt_order);
        Ok(out)
    }

    async fn unsynced_attempts(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Attempt>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<Attempt> = guard
            .attempts
            .values()
            .filter(|a| &a.session_id == session_id && !a.is_synced)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.attempt_order);
        Ok(out)
    }

    async fn mark_attempts_synced(&self, keys: &[AttemptKey]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        for key in keys {
            if let Some(attempt) = guard.attempts.get_mut(key) {
                attempt.is_synced = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TestTransaction for InMemoryRepository {
    async fn initialize_test_session(
        &self,
        session: &TestSession,
        questions: &[Question],
        attempts: &[Attempt],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.insert(session.id.clone(), session.clone());
        for question in questions {
            guard
                .questions
                .insert(question.id.clone(), question.clone());
        }
        for attempt in attempts {
            guard.attempts.insert(attempt.key(), attempt.clone());
        }
        Ok(())
    }

    async fn complete_test_session(
        &self,
        session: &TestSession,
        attempts: &[Attempt],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.insert(session.id.clone(), session.clone());
        for attempt in attempts {
            guard.attempts.insert(attempt.key(), attempt.clone());
        }
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping. Constructed once at startup and injected everywhere a
/// component needs the local store.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub transactions: Arc<dyn TestTransaction>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(InMemoryRepository::new())
    }

    pub(crate) fn from_parts<R>(repo: R) -> Self
    where
        R: QuestionRepository
            + SessionRepository
            + AttemptRepository
            + TestTransaction
            + Clone
            + 'static,
    {
        Self {
            questions: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            transactions: Arc::new(repo),
        }
    }
}
