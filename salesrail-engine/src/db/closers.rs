//! Closer queries

use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use salesrail_common::db::models::Closer;
use salesrail_common::Result;

const CLOSER_COLUMNS: &str = "guid, name, email, total_calls, total_conversions, total_revenue, \
     conversion_rate, is_active, is_approved";

/// Insert a new closer
pub async fn insert_closer(
    db: &Pool<Sqlite>,
    name: &str,
    email: Option<&str>,
    is_approved: bool,
) -> Result<String> {
    let guid = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO closers (guid, name, email, is_approved) VALUES (?, ?, ?, ?)")
        .bind(&guid)
        .bind(name)
        .bind(email)
        .bind(is_approved)
        .execute(db)
        .await?;

    Ok(guid)
}

/// Fetch one closer by id
pub async fn fetch_closer(db: &Pool<Sqlite>, closer_id: &str) -> Result<Option<Closer>> {
    let closer = sqlx::query_as::<_, Closer>(&format!(
        "SELECT {} FROM closers WHERE guid = ?",
        CLOSER_COLUMNS
    ))
    .bind(closer_id)
    .fetch_optional(db)
    .await?;

    Ok(closer)
}
