//! Countdown timer for an in-progress test session.
//!
//! The countdown is a pure per-second state machine; `SessionTimer` couples it
//! to storage so remaining time survives a crash between checkpoints.

use std::sync::Arc;

use exam_core::model::SessionId;
use storage::repository::{SessionRepository, StorageError};

/// Remaining-time values divisible by this many seconds are persisted.
pub const CHECKPOINT_INTERVAL_SECONDS: u32 = 5;

/// Outcome of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed.
    Tick { remaining: u32 },
    /// One second elapsed and the new remaining value hit a checkpoint boundary.
    Checkpoint { remaining: u32 },
    /// Remaining time reached zero on this tick. Reported exactly once.
    Expired,
    /// The countdown had already expired; nothing changed.
    Halted,
}

/// Per-second countdown state machine.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u32,
    expiry_reported: bool,
}

impl Countdown {
    #[must_use]
    pub fn new(remaining_seconds: u32) -> Self {
        Self {
            remaining: remaining_seconds,
            expiry_reported: false,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == 0 && self.expiry_reported
    }

    /// Advance by one second and classify the result.
    pub fn tick(&mut self) -> TimerEvent {
        if self.remaining == 0 {
            if self.expiry_reported {
                return TimerEvent::Halted;
            }
            self.expiry_reported = true;
            return TimerEvent::Expired;
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.expiry_reported = true;
            return TimerEvent::Expired;
        }
        if self.remaining % CHECKPOINT_INTERVAL_SECONDS == 0 {
            return TimerEvent::Checkpoint {
                remaining: self.remaining,
            };
        }
        TimerEvent::Tick {
            remaining: self.remaining,
        }
    }
}

/// Countdown bound to a session row, persisting checkpoints as it ticks.
pub struct SessionTimer {
    session_id: SessionId,
    countdown: Countdown,
    sessions: Arc<dyn SessionRepository>,
}

impl SessionTimer {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        remaining_seconds: u32,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            session_id,
            countdown: Countdown::new(remaining_seconds),
            sessions,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.countdown.remaining()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.countdown.is_expired()
    }

    /// Advance by one second, writing the remaining value through on
    /// checkpoint boundaries and on expiry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the checkpoint write fails. The in-memory
    /// countdown has already advanced; a later checkpoint or flush catches up.
    pub async fn tick(&mut self) -> Result<TimerEvent, StorageError> {
        let event = self.countdown.tick();
        match event {
            TimerEvent::Checkpoint { remaining } => {
                self.sessions
                    .update_remaining_time(&self.session_id, remaining)
                    .await?;
            }
            TimerEvent::Expired => {
                self.sessions
                    .update_remaining_time(&self.session_id, 0)
                    .await?;
            }
            TimerEvent::Tick { .. } | TimerEvent::Halted => {}
        }
        Ok(event)
    }

    /// Persist the current remaining value regardless of checkpoint alignment.
    ///
    /// Called on pause and teardown so at most a few seconds of countdown are
    /// ever lost.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the write fails.
    pub async fn flush(&self) -> Result<(), StorageError> {
        self.sessions
            .update_remaining_time(&self.session_id, self.countdown.remaining())
            .await
    }
}

#[cfg(test)]
mod tests {
    use exam_core::model::{SessionId, TestSession};
    use storage::repository::Storage;

    use super::*;

    #[test]
    fn tick_counts_down_and_flags_checkpoints() {
        let mut countdown = Countdown::new(7);
        assert_eq!(countdown.tick(), TimerEvent::Tick { remaining: 6 });
        assert_eq!(countdown.tick(), TimerEvent::Checkpoint { remaining: 5 });
        assert_eq!(countdown.tick(), TimerEvent::Tick { remaining: 4 });
    }

    #[test]
    fn expiry_is_reported_exactly_once() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), TimerEvent::Tick { remaining: 1 });
        assert_eq!(countdown.tick(), TimerEvent::Expired);
        assert_eq!(countdown.tick(), TimerEvent::Halted);
        assert_eq!(countdown.tick(), TimerEvent::Halted);
        assert!(countdown.is_expired());
    }

    #[test]
    fn zero_duration_expires_on_first_tick() {
        let mut countdown = Countdown::new(0);
        assert_eq!(countdown.tick(), TimerEvent::Expired);
        assert_eq!(countdown.tick(), TimerEvent::Halted);
    }

    #[tokio::test]
    async fn checkpoints_and_flush_write_through() {
        let storage = Storage::in_memory();
        let session = TestSession::new(SessionId::new("s1"), 12);
        storage.sessions.upsert_session(&session).await.unwrap();

        let mut timer = SessionTimer::new(session.id.clone(), 12, storage.sessions.clone());

        // 12 -> 11: plain tick, stored value unchanged.
        timer.tick().await.unwrap();
        let stored = storage.sessions.get_session(&session.id).await.unwrap();
        assert_eq!(stored.remaining_time_seconds, 12);

        // 11 -> 10: checkpoint boundary.
        timer.tick().await.unwrap();
        let stored = storage.sessions.get_session(&session.id).await.unwrap();
        assert_eq!(stored.remaining_time_seconds, 10);

        // 10 -> 9, then flush persists the off-boundary value.
        timer.tick().await.unwrap();
        timer.flush().await.unwrap();
        let stored = storage.sessions.get_session(&session.id).await.unwrap();
        assert_eq!(stored.remaining_time_seconds, 9);
    }

    #[tokio::test]
    async fn expiry_persists_zero() {
        let storage = Storage::in_memory();
        let session = TestSession::new(SessionId::new("s1"), 1);
        storage.sessions.upsert_session(&session).await.unwrap();

        let mut timer = SessionTimer::new(session.id.clone(), 1, storage.sessions.clone());
        assert_eq!(timer.tick().await.unwrap(), TimerEvent::Expired);
        assert_eq!(timer.tick().await.unwrap(), TimerEvent::Halted);

        let stored = storage.sessions.get_session(&session.id).await.unwrap();
        assert_eq!(stored.remaining_time_seconds, 0);
    }
}
