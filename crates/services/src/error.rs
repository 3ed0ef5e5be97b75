//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by the remote store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("remote rejected the request with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("remote store is unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted by the sync coordinator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while running a test session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunError {
    #[error("no questions available for the session")]
    Empty,
    #[error("session not found")]
    UnknownSession,
    #[error(transparent)]
    Cursor(#[from] exam_core::CursorError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
