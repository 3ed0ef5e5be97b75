use chrono::{DateTime, Duration, Utc};

/// Time source for the session services. Reads the system clock unless it
/// has been frozen, which is how tests drive elapsed-time accounting
/// deterministically.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    frozen_at: Option<DateTime<Utc>>,
}

impl Clock {
    /// A clock that follows system time.
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// A clock frozen at the given instant.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self {
            frozen_at: Some(at),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.frozen_at.unwrap_or_else(Utc::now)
    }

    /// Move a frozen clock forward. Has no effect on a system clock.
    pub fn advance(&mut self, delta: Duration) {
        if let Some(t) = &mut self.frozen_at {
            *t += delta;
        }
    }
}

/// Deterministic timestamp for tests and doc examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` frozen at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_clock_only_moves_when_advanced() {
        let mut clock = fixed_clock();
        assert_eq!(clock.now(), fixed_now());
        assert_eq!(clock.now(), fixed_now());

        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(30));
    }

    #[test]
    fn system_clock_ignores_advance() {
        let mut clock = Clock::system();
        let before = Utc::now();
        clock.advance(Duration::hours(1));
        assert!(clock.now() - before < Duration::minutes(5));
    }
}
