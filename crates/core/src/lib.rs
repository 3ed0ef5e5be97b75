#![forbid(unsafe_code)]

pub mod cursor;
pub mod grading;
pub mod model;
pub mod time;

pub use cursor::{Cursor, CursorError};
pub use grading::{GradeOutcome, SessionTotals, grade};
pub use time::Clock;
