#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AttemptRepository, InMemoryRepository, QuestionRepository, SessionRepository, Storage,
    StorageError, TestTransaction,
};
