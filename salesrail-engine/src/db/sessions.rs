//! Quiz session and answer queries

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use salesrail_common::db::models::QuizSession;
use salesrail_common::types::QuestionRole;
use salesrail_common::{Error, Result};

use crate::services::qualifier::RoleAnswer;

/// Insert a quiz question with an explicit semantic role
pub async fn insert_question(
    db: &Pool<Sqlite>,
    prompt: &str,
    role: QuestionRole,
    position: i64,
) -> Result<String> {
    let guid = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO quiz_questions (guid, prompt, role, position) VALUES (?, ?, ?, ?)")
        .bind(&guid)
        .bind(prompt)
        .bind(role.as_str())
        .bind(position)
        .execute(db)
        .await?;

    Ok(guid)
}

/// Start a new quiz session
pub async fn insert_session(
    db: &Pool<Sqlite>,
    affiliate_code: Option<&str>,
    started_at: DateTime<Utc>,
) -> Result<String> {
    let guid = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO quiz_sessions (guid, status, affiliate_code, started_at) \
         VALUES (?, 'in_progress', ?, ?)",
    )
    .bind(&guid)
    .bind(affiliate_code)
    .bind(started_at)
    .execute(db)
    .await?;

    Ok(guid)
}

/// Fetch one session by id
pub async fn fetch_session(db: &Pool<Sqlite>, session_id: &str) -> Result<Option<QuizSession>> {
    let session = sqlx::query_as::<_, QuizSession>(
        "SELECT guid, status, affiliate_code, started_at, completed_at \
         FROM quiz_sessions WHERE guid = ?",
    )
    .bind(session_id)
    .fetch_optional(db)
    .await?;

    Ok(session)
}

/// Record one answer, overwriting any previous answer to the same question
pub async fn upsert_answer(
    db: &Pool<Sqlite>,
    session_id: &str,
    question_id: &str,
    value: Option<&str>,
) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quiz_questions WHERE guid = ?)")
        .bind(question_id)
        .fetch_one(db)
        .await?;
    if !exists {
        return Err(Error::NotFound(format!("question {}", question_id)));
    }

    sqlx::query(
        "INSERT INTO quiz_answers (session_id, question_id, value) VALUES (?, ?, ?)
         ON CONFLICT(session_id, question_id) DO UPDATE SET value = excluded.value",
    )
    .bind(session_id)
    .bind(question_id)
    .bind(value)
    .execute(db)
    .await?;

    Ok(())
}

/// Mark a session completed. Completed sessions are immutable afterwards,
/// so a second completion keeps the original completed_at.
pub async fn mark_completed(
    db: &Pool<Sqlite>,
    session_id: &str,
    completed_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE quiz_sessions \
         SET status = 'completed', completed_at = ?, updated_at = ? \
         WHERE guid = ? AND status = 'in_progress'",
    )
    .bind(completed_at)
    .bind(completed_at)
    .bind(session_id)
    .execute(db)
    .await?;

    Ok(())
}

/// Fetch a session's answers joined with each question's semantic role
pub async fn fetch_role_answers(db: &Pool<Sqlite>, session_id: &str) -> Result<Vec<RoleAnswer>> {
    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT q.role, a.value \
         FROM quiz_answers a \
         JOIN quiz_questions q ON q.guid = a.question_id \
         WHERE a.session_id = ? \
         ORDER BY q.position",
    )
    .bind(session_id)
    .fetch_all(db)
    .await?;

    let mut answers = Vec::with_capacity(rows.len());
    for (role, value) in rows {
        // Unknown role text would mean schema drift; treat it as 'other'
        // rather than failing the read path
        let role = role.parse::<QuestionRole>().unwrap_or(QuestionRole::Other);
        answers.push(RoleAnswer { role, value });
    }

    Ok(answers)
}

/// Fetch all completed sessions tagged with the given affiliate code
pub async fn fetch_completed_for_code(
    db: &Pool<Sqlite>,
    affiliate_code: &str,
) -> Result<Vec<QuizSession>> {
    let sessions = sqlx::query_as::<_, QuizSession>(
        "SELECT guid, status, affiliate_code, started_at, completed_at \
         FROM quiz_sessions \
         WHERE status = 'completed' AND affiliate_code = ? \
         ORDER BY guid",
    )
    .bind(affiliate_code)
    .fetch_all(db)
    .await?;

    Ok(sessions)
}
