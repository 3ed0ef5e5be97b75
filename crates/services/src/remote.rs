//! Remote store used by the sync coordinator.
//!
//! Uploads are idempotent upserts keyed by session id (sessions) and by
//! session id plus question id (attempts), so re-sending an already delivered
//! record is harmless.

use std::env;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

use exam_core::model::{Attempt, TestSession};

use crate::error::RemoteError;

/// Destination for synced session and attempt records.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upsert a batch of attempt records keyed by (session id, question id).
    async fn upsert_attempts(&self, attempts: &[Attempt]) -> Result<(), RemoteError>;

    /// Upsert a session record keyed by session id.
    async fn upsert_session(&self, session: &TestSession) -> Result<(), RemoteError>;
}

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
}

impl RemoteConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("EXAM_SYNC_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("EXAM_SYNC_BASE_URL")
            .unwrap_or_else(|_| "https://sync.example.com/v1".into());
        Some(Self { base_url, api_key })
    }
}

/// HTTP-backed remote store.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    config: RemoteConfig,
}

impl HttpRemoteStore {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, payload: &T) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upsert_attempts(&self, attempts: &[Attempt]) -> Result<(), RemoteError> {
        if attempts.is_empty() {
            return Ok(());
        }
        let records: Vec<AttemptRecord<'_>> = attempts.iter().map(AttemptRecord::from).collect();
        self.post("attempts:upsert", &records).await
    }

    async fn upsert_session(&self, session: &TestSession) -> Result<(), RemoteError> {
        self.post("sessions:upsert", &SessionRecord::from(session))
            .await
    }
}

#[derive(Debug, Serialize)]
struct AttemptRecord<'a> {
    /// Composite conflict key the remote upserts on.
    key: String,
    session_id: &'a str,
    question_id: &'a str,
    user_answer: Option<&'a exam_core::model::UserAnswer>,
    status: &'a str,
    marked_for_review: bool,
    time_spent_seconds: u32,
    attempt_order: u32,
    score: f64,
    is_correct: Option<bool>,
}

impl<'a> From<&'a Attempt> for AttemptRecord<'a> {
    fn from(attempt: &'a Attempt) -> Self {
        Self {
            key: attempt.key().storage_key(),
            session_id: attempt.session_id.as_str(),
            question_id: attempt.question_id.as_str(),
            user_answer: attempt.user_answer.as_ref(),
            status: attempt.status.as_str(),
            marked_for_review: attempt.marked_for_review,
            time_spent_seconds: attempt.time_spent_seconds,
            attempt_order: attempt.attempt_order,
            score: attempt.score,
            is_correct: attempt.is_correct,
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionRecord<'a> {
    id: &'a str,
    status: &'a str,
    remaining_time_seconds: u32,
    score: f64,
    accuracy: f64,
    correct_count: u32,
    attempted_count: u32,
    completed_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a TestSession> for SessionRecord<'a> {
    fn from(session: &'a TestSession) -> Self {
        Self {
            id: session.id.as_str(),
            status: session.status.as_str(),
            remaining_time_seconds: session.remaining_time_seconds,
            score: session.score,
            accuracy: session.accuracy,
            correct_count: session.correct_count,
            attempted_count: session.attempted_count,
            completed_at: session.completed_at,
        }
    }
}
