//! Reconciles locally dirty records with the remote store.
//!
//! Delivery is at-least-once: dirty flags are cleared only after the remote
//! acknowledges a batch, and the remote upserts by natural key so a retried
//! push collapses into the same remote state.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use exam_core::model::{Attempt, AttemptKey, QuestionId, SessionId, attempt_order};
use storage::repository::{AttemptRepository, SessionRepository};

use crate::error::SyncError;
use crate::remote::RemoteStore;

/// What a single push delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub attempts_pushed: usize,
}

/// Pushes one session's dirty state to the remote store.
#[derive(Clone)]
pub struct SyncCoordinator {
    session_id: SessionId,
    canonical: Vec<QuestionId>,
    sessions: Arc<dyn SessionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    remote: Arc<dyn RemoteStore>,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        canonical: Vec<QuestionId>,
        sessions: Arc<dyn SessionRepository>,
        attempts: Arc<dyn AttemptRepository>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            session_id,
            canonical,
            sessions,
            attempts,
            remote,
        }
    }

    /// Push the session record plus every attempt that is dirty right now.
    ///
    /// The session record (and its remaining time) is sent unconditionally.
    /// Dirty flags are cleared for exactly the batch that was read; records
    /// dirtied after the read stay dirty for the next pass.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` on storage or remote failure. Dirty flags are left
    /// untouched so the next push retries the same records.
    pub async fn push_dirty(&self) -> Result<SyncReport, SyncError> {
        let session = self.sessions.get_session(&self.session_id).await?;
        let dirty = self.attempts.unsynced_attempts(&self.session_id).await?;
        let batch = self.with_recomputed_order(dirty);

        self.remote.upsert_session(&session).await?;
        self.remote.upsert_attempts(&batch).await?;

        let keys: Vec<AttemptKey> = batch.iter().map(Attempt::key).collect();
        self.attempts.mark_attempts_synced(&keys).await?;
        if !session.is_synced {
            self.sessions.mark_session_synced(&self.session_id).await?;
        }

        Ok(SyncReport {
            attempts_pushed: batch.len(),
        })
    }

    /// Full resync run once during submission, after grading: pushes the
    /// authoritative session fields and every attempt regardless of dirty
    /// flag.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` on storage or remote failure; the caller decides
    /// whether submission may complete without it.
    pub async fn final_sync(&self) -> Result<SyncReport, SyncError> {
        let session = self.sessions.get_session(&self.session_id).await?;
        let all = self.attempts.attempts_for_session(&self.session_id).await?;
        let batch = self.with_recomputed_order(all);

        self.remote.upsert_session(&session).await?;
        self.remote.upsert_attempts(&batch).await?;

        let keys: Vec<AttemptKey> = batch.iter().map(Attempt::key).collect();
        self.attempts.mark_attempts_synced(&keys).await?;
        if !session.is_synced {
            self.sessions.mark_session_synced(&self.session_id).await?;
        }

        Ok(SyncReport {
            attempts_pushed: batch.len(),
        })
    }

    /// Run an immediate push, then keep pushing on a fixed period until the
    /// returned handle is dropped or stopped.
    ///
    /// Failures are logged and retried on the next beat; the heartbeat never
    /// propagates errors to the session's control flow.
    #[must_use]
    pub fn spawn_heartbeat(self: Arc<Self>, period: Duration) -> HeartbeatHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // First tick of `interval` fires immediately.
                ticker.tick().await;
                if let Err(e) = self.push_dirty().await {
                    warn!(session_id = %self.session_id, error = %e, "sync heartbeat failed");
                }
            }
        });
        HeartbeatHandle { task }
    }

    /// Rebuild payload ordering from the canonical question list so the
    /// remote copy never carries a stale stored order.
    fn with_recomputed_order(&self, mut batch: Vec<Attempt>) -> Vec<Attempt> {
        for attempt in &mut batch {
            if let Some(order) = attempt_order(&self.canonical, &attempt.question_id) {
                attempt.attempt_order = order;
            }
        }
        batch
    }
}

/// Aborts the heartbeat task when dropped.
pub struct HeartbeatHandle {
    task: tokio::task::JoinHandle<()>,
}

impl HeartbeatHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
