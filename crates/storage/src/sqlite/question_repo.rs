use std::collections::HashMap;

use exam_core::model::{Question, QuestionId};

use super::{
    SqliteRepository,
    mapping::{json_string, map_question_row},
};
use crate::repository::{QuestionRepository, StorageError};

pub(crate) async fn upsert_question<'e, E>(
    executor: E,
    question: &Question,
) -> Result<(), StorageError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO questions (
            id, subject, topic, options, correct_answer, marks, tags
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(id) DO UPDATE SET
            subject = excluded.subject,
            topic = excluded.topic,
            options = excluded.options,
            correct_answer = excluded.correct_answer,
            marks = excluded.marks,
            tags = excluded.tags
        ",
    )
    .bind(question.id.as_str())
    .bind(&question.subject)
    .bind(&question.topic)
    .bind(json_string(&question.options)?)
    .bind(json_string(&question.correct_answer)?)
    .bind(question.marks)
    .bind(json_string(&question.tags)?)
    .execute(executor)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(())
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for question in questions {
            upsert_question(&mut *tx, question).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get_question(&self, id: &QuestionId) -> Result<Question, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, subject, topic, options, correct_answer, marks, tags
            FROM questions
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_question_row(&row)
    }

    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
            SELECT id, subject, topic, options, correct_answer, marks, tags
            FROM questions
            WHERE id IN (
            ",
        );

        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(")\n");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id.as_str());
        }

        let rows = q
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut by_id: HashMap<QuestionId, Question> = HashMap::with_capacity(rows.len());
        for row in rows {
            let question = map_question_row(&row)?;
            by_id.insert(question.id.clone(), question);
        }

        // Re-emit in the requested (canonical) order.
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                Some(question) => out.push(question),
                None => return Err(StorageError::NotFound),
            }
        }

        Ok(out)
    }

    async fn questions_by_topic(&self, topic: &str) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, subject, topic, options, correct_answer, marks, tags
            FROM questions
            WHERE topic = ?1
            ORDER BY id ASC
            ",
        )
        .bind(topic)
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(out)
    }
}
