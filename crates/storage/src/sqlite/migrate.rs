use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema: questions, test sessions, attempts with their
/// composite primary key, and the secondary indexes the sync and topic
/// queries rely on.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id TEXT PRIMARY KEY,
                    subject TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_answer TEXT NOT NULL,
                    marks REAL,
                    tags TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS test_sessions (
                    id TEXT PRIMARY KEY,
                    status TEXT NOT NULL,
                    remaining_time_seconds INTEGER NOT NULL
                        CHECK (remaining_time_seconds >= 0),
                    score REAL NOT NULL,
                    accuracy REAL NOT NULL,
                    correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
                    attempted_count INTEGER NOT NULL CHECK (attempted_count >= 0),
                    completed_at TEXT,
                    is_synced INTEGER NOT NULL CHECK (is_synced IN (0, 1))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS attempts (
                    session_id TEXT NOT NULL,
                    question_id TEXT NOT NULL,
                    user_answer TEXT,
                    status TEXT NOT NULL,
                    marked_for_review INTEGER NOT NULL
                        CHECK (marked_for_review IN (0, 1)),
                    time_spent_seconds INTEGER NOT NULL
                        CHECK (time_spent_seconds >= 0),
                    attempt_order INTEGER NOT NULL CHECK (attempt_order >= 1),
                    score REAL NOT NULL,
                    is_correct INTEGER CHECK (is_correct IN (0, 1)),
                    is_synced INTEGER NOT NULL CHECK (is_synced IN (0, 1)),
                    PRIMARY KEY (session_id, question_id),
                    FOREIGN KEY (session_id) REFERENCES test_sessions(id)
                        ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_topic
                    ON questions (topic);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_test_sessions_status
                    ON test_sessions (status);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_test_sessions_is_synced
                    ON test_sessions (is_synced);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attempts_session
                    ON attempts (session_id, attempt_order);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attempts_session_is_synced
                    ON attempts (session_id, is_synced);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
