//! Appointment queries

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use salesrail_common::db::models::Appointment;
use salesrail_common::Result;

const APPOINTMENT_COLUMNS: &str = "guid, customer_name, customer_email, scheduled_at, status, outcome, \
     sale_value, notes, recording_link, affiliate_code, closer_id, created_at, updated_at";

/// Insert a new appointment. Status starts at 'pending' unless a closer
/// was booked directly, in which case it is already 'confirmed'.
pub async fn insert_appointment(
    db: &Pool<Sqlite>,
    customer_name: &str,
    customer_email: &str,
    scheduled_at: DateTime<Utc>,
    affiliate_code: Option<&str>,
    closer_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String> {
    let guid = Uuid::new_v4().to_string();
    let status = if closer_id.is_some() { "confirmed" } else { "pending" };

    sqlx::query(
        "INSERT INTO appointments \
         (guid, customer_name, customer_email, scheduled_at, status, affiliate_code, closer_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&guid)
    .bind(customer_name)
    .bind(customer_email)
    .bind(scheduled_at)
    .bind(status)
    .bind(affiliate_code)
    .bind(closer_id)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(guid)
}

/// Fetch one appointment by id
pub async fn fetch_appointment(db: &Pool<Sqlite>, appointment_id: &str) -> Result<Option<Appointment>> {
    let appointment = sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {} FROM appointments WHERE guid = ?",
        APPOINTMENT_COLUMNS
    ))
    .bind(appointment_id)
    .fetch_optional(db)
    .await?;

    Ok(appointment)
}

/// List pending appointments with no closer assigned
pub async fn list_unassigned(db: &Pool<Sqlite>) -> Result<Vec<Appointment>> {
    let appointments = sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {} FROM appointments \
         WHERE closer_id IS NULL AND status = 'pending' \
         ORDER BY created_at",
        APPOINTMENT_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    Ok(appointments)
}

/// Fetch all appointments tagged with the given affiliate code
pub async fn fetch_for_affiliate_code(
    db: &Pool<Sqlite>,
    affiliate_code: &str,
) -> Result<Vec<Appointment>> {
    let appointments = sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {} FROM appointments WHERE affiliate_code = ? ORDER BY created_at",
        APPOINTMENT_COLUMNS
    ))
    .bind(affiliate_code)
    .fetch_all(db)
    .await?;

    Ok(appointments)
}
