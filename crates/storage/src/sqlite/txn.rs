use exam_core::model::{Attempt, Question, TestSession};

use super::{SqliteRepository, attempt_repo, question_repo, session_repo};
use crate::repository::{StorageError, TestTransaction};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl TestTransaction for SqliteRepository {
    async fn initialize_test_session(
        &self,
        session: &TestSession,
        questions: &[Question],
        attempts: &[Attempt],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await.map_err(conn)?;

        session_repo::upsert_session(&mut *tx, session).await?;
        for question in questions {
            question_repo::upsert_question(&mut *tx, question).await?;
        }
        for attempt in attempts {
            attempt_repo::upsert_attempt(&mut *tx, attempt).await?;
        }

        // A failure before this point rolls everything back on drop.
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn complete_test_session(
        &self,
        session: &TestSession,
        attempts: &[Attempt],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await.map_err(conn)?;

        session_repo::upsert_session(&mut *tx, session).await?;
        for attempt in attempts {
            attempt_repo::upsert_attempt(&mut *tx, attempt).await?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
