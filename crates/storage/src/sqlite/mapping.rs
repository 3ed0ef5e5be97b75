use exam_core::model::{
    Attempt, AttemptStatus, CorrectAnswer, Question, QuestionId, SessionId, SessionStatus,
    TestSession, UserAnswer,
};
use sqlx::Row;
use std::collections::BTreeSet;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn parse_session_status(s: &str) -> Result<SessionStatus, StorageError> {
    match s {
        "ready" => Ok(SessionStatus::Ready),
        "in_progress" => Ok(SessionStatus::InProgress),
        "completed" => Ok(SessionStatus::Completed),
        _ => Err(StorageError::Serialization(format!(
            "invalid session status: {s}"
        ))),
    }
}

pub(crate) fn parse_attempt_status(s: &str) -> Result<AttemptStatus, StorageError> {
    match s {
        "unvisited" => Ok(AttemptStatus::Unvisited),
        "visited" => Ok(AttemptStatus::Visited),
        "answered" => Ok(AttemptStatus::Answered),
        "marked_for_review" => Ok(AttemptStatus::MarkedForReview),
        "correct" => Ok(AttemptStatus::Correct),
        "incorrect" => Ok(AttemptStatus::Incorrect),
        "skipped" => Ok(AttemptStatus::Skipped),
        _ => Err(StorageError::Serialization(format!(
            "invalid attempt status: {s}"
        ))),
    }
}

pub(crate) fn json_string<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

fn json_parse<T: serde::de::DeserializeOwned>(
    field: &'static str,
    raw: &str,
) -> Result<T, StorageError> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::Serialization(format!("invalid {field}: {e}")))
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let options: Vec<String> =
        json_parse("options", row.try_get::<String, _>("options").map_err(ser)?.as_str())?;
    let correct_answer: CorrectAnswer = json_parse(
        "correct_answer",
        row.try_get::<String, _>("correct_answer").map_err(ser)?.as_str(),
    )?;
    let tags: BTreeSet<String> =
        json_parse("tags", row.try_get::<String, _>("tags").map_err(ser)?.as_str())?;

    Ok(Question {
        id: QuestionId::new(row.try_get::<String, _>("id").map_err(ser)?),
        subject: row.try_get("subject").map_err(ser)?,
        topic: row.try_get("topic").map_err(ser)?,
        options,
        correct_answer,
        marks: row.try_get("marks").map_err(ser)?,
        tags,
    })
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<TestSession, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;

    Ok(TestSession {
        id: SessionId::new(row.try_get::<String, _>("id").map_err(ser)?),
        status: parse_session_status(&status_str)?,
        remaining_time_seconds: u32_from_i64(
            "remaining_time_seconds",
            row.try_get::<i64, _>("remaining_time_seconds").map_err(ser)?,
        )?,
        score: row.try_get("score").map_err(ser)?,
        accuracy: row.try_get("accuracy").map_err(ser)?,
        correct_count: u32_from_i64(
            "correct_count",
            row.try_get::<i64, _>("correct_count").map_err(ser)?,
        )?,
        attempted_count: u32_from_i64(
            "attempted_count",
            row.try_get::<i64, _>("attempted_count").map_err(ser)?,
        )?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        is_synced: row.try_get::<i64, _>("is_synced").map_err(ser)? != 0,
    })
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let user_answer: Option<UserAnswer> = row
        .try_get::<Option<String>, _>("user_answer")
        .map_err(ser)?
        .map(|raw| json_parse("user_answer", &raw))
        .transpose()?;
    let status_str: String = row.try_get("status").map_err(ser)?;

    Ok(Attempt {
        session_id: SessionId::new(row.try_get::<String, _>("session_id").map_err(ser)?),
        question_id: QuestionId::new(row.try_get::<String, _>("question_id").map_err(ser)?),
        user_answer,
        status: parse_attempt_status(&status_str)?,
        marked_for_review: row.try_get::<i64, _>("marked_for_review").map_err(ser)? != 0,
        time_spent_seconds: u32_from_i64(
            "time_spent_seconds",
            row.try_get::<i64, _>("time_spent_seconds").map_err(ser)?,
        )?,
        attempt_order: u32_from_i64(
            "attempt_order",
            row.try_get::<i64, _>("attempt_order").map_err(ser)?,
        )?,
        score: row.try_get("score").map_err(ser)?,
        is_correct: row
            .try_get::<Option<i64>, _>("is_correct")
            .map_err(ser)?
            .map(|v| v != 0),
        is_synced: row.try_get::<i64, _>("is_synced").map_err(ser)? != 0,
    })
}
