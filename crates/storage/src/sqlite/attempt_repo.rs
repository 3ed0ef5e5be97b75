use exam_core::model::{Attempt, AttemptKey, SessionId};

use super::{
    SqliteRepository,
    mapping::{json_string, map_attempt_row},
};
use crate::repository::{AttemptRepository, StorageError};

pub(crate) async fn upsert_attempt<'e, E>(
    executor: E,
    attempt: &Attempt,
) -> Result<(), StorageError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let user_answer = attempt
        .user_answer
        .as_ref()
        .map(json_string)
        .transpose()?;

    sqlx::query(
        r"
        INSERT INTO attempts (
            session_id, question_id, user_answer, status, marked_for_review,
            time_spent_seconds, attempt_order, score, is_correct, is_synced
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(session_id, question_id) DO UPDATE SET
            user_answer = excluded.user_answer,
            status = excluded.status,
            marked_for_review = excluded.marked_for_review,
            time_spent_seconds = excluded.time_spent_seconds,
            attempt_order = excluded.attempt_order,
            score = excluded.score,
            is_correct = excluded.is_correct,
            is_synced = excluded.is_synced
        ",
    )
    .bind(attempt.session_id.as_str())
    .bind(attempt.question_id.as_str())
    .bind(user_answer)
    .bind(attempt.status.as_str())
    .bind(i64::from(attempt.marked_for_review))
    .bind(i64::from(attempt.time_spent_seconds))
    .bind(i64::from(attempt.attempt_order))
    .bind(attempt.score)
    .bind(attempt.is_correct.map(i64::from))
    .bind(i64::from(attempt.is_synced))
    .execute(executor)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(())
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn upsert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        upsert_attempt(self.pool(), attempt).await
    }

    async fn get_attempt(&self, key: &AttemptKey) -> Result<Attempt, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                session_id, question_id, user_answer, status, marked_for_review,
                time_spent_seconds, attempt_order, score, is_correct, is_synced
            FROM attempts
            WHERE session_id = ?1 AND question_id = ?2
            ",
        )
        .bind(key.session_id.as_str())
        .bind(key.question_id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn attempts_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                session_id, question_id, user_answer, status, marked_for_review,
                time_spent_seconds, attempt_order, score, is_correct, is_synced
            FROM attempts
            WHERE session_id = ?1
            ORDER BY attempt_order ASC
            ",
        )
        .bind(session_id.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn unsynced_attempts(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                session_id, question_id, user_answer, status, marked_for_review,
                time_spent_seconds, attempt_order, score, is_correct, is_synced
            FROM attempts
            WHERE session_id = ?1 AND is_synced = 0
            ORDER BY attempt_order ASC
            ",
        )
        .bind(session_id.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn mark_attempts_synced(&self, keys: &[AttemptKey]) -> Result<(), StorageError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for key in keys {
            sqlx::query(
                r"
                UPDATE attempts
                SET is_synced = 1
                WHERE session_id = ?1 AND question_id = ?2
                ",
            )
            .bind(key.session_id.as_str())
            .bind(key.question_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
