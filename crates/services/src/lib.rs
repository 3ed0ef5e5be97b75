#![forbid(unsafe_code)]

//! Session orchestration over `exam-core` and `storage`: answer tracking,
//! the countdown timer, sync with the remote store, and the session runner
//! that ties them together.

pub mod answer_tracker;
pub mod error;
pub mod remote;
pub mod session_runner;
pub mod sync;
pub mod timer;

pub use answer_tracker::AnswerTracker;
pub use error::{RemoteError, SyncError, TestRunError};
pub use remote::{HttpRemoteStore, RemoteConfig, RemoteStore};
pub use session_runner::{SessionProgress, SubmitOutcome, TestRunner, TickOutcome};
pub use sync::{HeartbeatHandle, SyncCoordinator, SyncReport};
pub use timer::{CHECKPOINT_INTERVAL_SECONDS, Countdown, SessionTimer, TimerEvent};
