use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("question index {index} out of range for {len} questions")]
    OutOfRange { index: usize, len: usize },
}

/// Navigation cursor over a session's fixed ordered question list.
///
/// Holds only the current index; committing elapsed time for the question
/// being left is the orchestrator's job and must happen before any move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    current: usize,
    len: usize,
}

impl Cursor {
    /// Cursor positioned at the first question. `len` must be non-zero;
    /// sessions with no questions are rejected before a cursor exists.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { current: 0, len }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Advance to the next question. No-op at the last index; returns
    /// whether the cursor moved.
    pub fn next(&mut self) -> bool {
        if self.current + 1 < self.len {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Move to the previous question. No-op at the first index; returns
    /// whether the cursor moved.
    pub fn prev(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    /// Jump directly to `index`. Out-of-range jumps are rejected rather than
    /// clamped, to surface caller bugs early.
    ///
    /// # Errors
    ///
    /// Returns `CursorError::OutOfRange` if `index >= len`.
    pub fn jump_to(&mut self, index: usize) -> Result<(), CursorError> {
        if index >= self.len {
            return Err(CursorError::OutOfRange {
                index,
                len: self.len,
            });
        }
        self.current = index;
        Ok(())
    }
}
