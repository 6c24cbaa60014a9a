//! Settings database operations
//!
//! Typed get/set accessors over the key-value settings table. A missing or
//! unparsable setting is never fatal for the getters with defaults; the
//! operation proceeds on the documented default.

use sqlx::{Pool, Sqlite};
use tracing::warn;

use crate::types::AppointmentOutcome;
use crate::{Error, Result};

/// Get commission hold period in days
///
/// **Default:** 30
pub async fn get_commission_hold_days(db: &Pool<Sqlite>) -> Result<i64> {
    Ok(get_setting(db, "commission_hold_days").await?.unwrap_or(30))
}

/// Get minimum number of answered questions before a completed session can
/// qualify as a lead
///
/// **Default:** 0
pub async fn get_qualification_threshold(db: &Pool<Sqlite>) -> Result<i64> {
    Ok(get_setting(db, "qualification_threshold").await?.unwrap_or(0))
}

/// Get minimum payout amount for the external payout processor
///
/// **Default:** 50
pub async fn get_minimum_payout(db: &Pool<Sqlite>) -> Result<f64> {
    Ok(get_setting(db, "minimum_payout").await?.unwrap_or(50.0))
}

/// Get payout schedule label
///
/// **Default:** "monthly"
pub async fn get_payout_schedule(db: &Pool<Sqlite>) -> Result<String> {
    Ok(get_setting(db, "payout_schedule")
        .await?
        .unwrap_or_else(|| "monthly".to_string()))
}

/// Get the set of outcomes considered final (no further contact expected)
///
/// Stored as a JSON array of outcome values. Unknown entries are dropped
/// with a warning rather than failing the caller.
///
/// **Default:** converted, not_interested, wrong_number
pub async fn get_terminal_outcomes(db: &Pool<Sqlite>) -> Result<Vec<AppointmentOutcome>> {
    let raw: Option<String> = get_setting(db, "terminal_outcomes").await?;

    let values: Vec<String> = match raw {
        Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("terminal_outcomes setting is not valid JSON ({}), using defaults", e);
            default_terminal_outcome_names()
        }),
        None => default_terminal_outcome_names(),
    };

    let mut outcomes = Vec::with_capacity(values.len());
    for value in values {
        match value.parse::<AppointmentOutcome>() {
            Ok(outcome) => outcomes.push(outcome),
            Err(_) => warn!("Ignoring unknown terminal outcome value: {}", value),
        }
    }

    Ok(outcomes)
}

fn default_terminal_outcome_names() -> Vec<String> {
    vec![
        "converted".to_string(),
        "not_interested".to_string(),
        "wrong_number".to_string(),
    ]
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
