use exam_core::model::{SessionId, TestSession};

use super::{SqliteRepository, mapping::map_session_row};
use crate::repository::{SessionRepository, StorageError};

pub(crate) async fn upsert_session<'e, E>(
    executor: E,
    session: &TestSession,
) -> Result<(), StorageError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO test_sessions (
            id, status, remaining_time_seconds, score, accuracy,
            correct_count, attempted_count, completed_at, is_synced
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            remaining_time_seconds = excluded.remaining_time_seconds,
            score = excluded.score,
            accuracy = excluded.accuracy,
            correct_count = excluded.correct_count,
            attempted_count = excluded.attempted_count,
            -- completed_at is set once; keep the original on re-upsert
            completed_at = COALESCE(test_sessions.completed_at, excluded.completed_at),
            is_synced = excluded.is_synced
        ",
    )
    .bind(session.id.as_str())
    .bind(session.status.as_str())
    .bind(i64::from(session.remaining_time_seconds))
    .bind(session.score)
    .bind(session.accuracy)
    .bind(i64::from(session.correct_count))
    .bind(i64::from(session.attempted_count))
    .bind(session.completed_at)
    .bind(i64::from(session.is_synced))
    .execute(executor)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(())
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn upsert_session(&self, session: &TestSession) -> Result<(), StorageError> {
        upsert_session(self.pool(), session).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<TestSession, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, status, remaining_time_seconds, score, accuracy,
                correct_count, attempted_count, completed_at, is_synced
            FROM test_sessions
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn update_remaining_time(
        &self,
        id: &SessionId,
        remaining_seconds: u32,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE test_sessions
            SET remaining_time_seconds = ?2
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .bind(i64::from(remaining_seconds))
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn mark_session_synced(&self, id: &SessionId) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE test_sessions
            SET is_synced = 1
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn unsynced_sessions(&self) -> Result<Vec<TestSession>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, status, remaining_time_seconds, score, accuracy,
                correct_count, attempted_count, completed_at, is_synced
            FROM test_sessions
            WHERE is_synced = 0
            ORDER BY id ASC
            ",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }
}
