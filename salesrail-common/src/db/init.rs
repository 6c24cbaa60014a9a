//! Database initialization
//!
//! Creates the SQLite database on first run, applies the schema
//! idempotently, and seeds default settings. Safe to call on every
//! startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer, which matters for
    // outcome updates landing while dashboards read stats
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Apply the full schema and seed default settings (idempotent).
///
/// Public so integration tests can build in-memory databases with the
/// production schema.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_quiz_questions_table(pool).await?;
    create_quiz_sessions_table(pool).await?;
    create_quiz_answers_table(pool).await?;
    create_affiliates_table(pool).await?;
    create_affiliate_clicks_table(pool).await?;
    create_closers_table(pool).await?;
    create_appointments_table(pool).await?;
    create_affiliate_conversions_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_quiz_questions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quiz_questions (
            guid TEXT PRIMARY KEY,
            prompt TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'other' CHECK (role IN ('name', 'email', 'other')),
            position INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quiz_questions_position ON quiz_questions(position)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_quiz_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quiz_sessions (
            guid TEXT PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'in_progress' CHECK (status IN ('in_progress', 'completed')),
            affiliate_code TEXT,
            started_at TIMESTAMP NOT NULL,
            completed_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quiz_sessions_status ON quiz_sessions(status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_quiz_sessions_affiliate_code ON quiz_sessions(affiliate_code)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_quiz_answers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quiz_answers (
            session_id TEXT NOT NULL REFERENCES quiz_sessions(guid) ON DELETE CASCADE,
            question_id TEXT NOT NULL REFERENCES quiz_questions(guid) ON DELETE CASCADE,
            value TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (session_id, question_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quiz_answers_session ON quiz_answers(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_affiliates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS affiliates (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            referral_code TEXT NOT NULL UNIQUE,
            custom_link TEXT UNIQUE,
            commission_rate REAL NOT NULL DEFAULT 0.1,
            tier TEXT NOT NULL DEFAULT 'standard',
            total_clicks INTEGER NOT NULL DEFAULT 0,
            total_leads INTEGER NOT NULL DEFAULT 0,
            total_bookings INTEGER NOT NULL DEFAULT 0,
            total_sales INTEGER NOT NULL DEFAULT 0,
            total_commission REAL NOT NULL DEFAULT 0,
            is_approved INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (commission_rate >= 0.0 AND commission_rate <= 1.0),
            CHECK (total_clicks >= 0),
            CHECK (total_leads >= 0),
            CHECK (total_bookings >= 0),
            CHECK (total_sales >= 0),
            CHECK (total_commission >= 0.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_affiliates_referral_code ON affiliates(referral_code)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_affiliates_custom_link ON affiliates(custom_link)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_affiliate_clicks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS affiliate_clicks (
            guid TEXT PRIMARY KEY,
            affiliate_id TEXT NOT NULL REFERENCES affiliates(guid) ON DELETE CASCADE,
            referral_code TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_affiliate_clicks_affiliate ON affiliate_clicks(affiliate_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_closers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS closers (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            total_calls INTEGER NOT NULL DEFAULT 0,
            total_conversions INTEGER NOT NULL DEFAULT 0,
            total_revenue REAL NOT NULL DEFAULT 0,
            conversion_rate REAL NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_approved INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (total_calls >= 0),
            CHECK (total_conversions >= 0),
            CHECK (total_revenue >= 0.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_closers_eligible ON closers(is_active, is_approved, total_calls)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_appointments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS appointments (
            guid TEXT PRIMARY KEY,
            customer_name TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            scheduled_at TIMESTAMP NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled', 'no_show')),
            outcome TEXT CHECK (outcome IS NULL OR outcome IN ('converted', 'not_interested', 'needs_follow_up', 'wrong_number', 'no_answer', 'callback_requested', 'rescheduled')),
            sale_value REAL,
            notes TEXT,
            recording_link TEXT,
            affiliate_code TEXT,
            closer_id TEXT REFERENCES closers(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            CHECK (sale_value IS NULL OR sale_value >= 0.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_appointments_closer ON appointments(closer_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_appointments_affiliate_code ON appointments(affiliate_code)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_appointments_unassigned ON appointments(status) WHERE closer_id IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the affiliate_conversions table
///
/// The UNIQUE (appointment_id, conversion_type) pair is the idempotency
/// key that makes conversion creation exactly-once under retried outcome
/// updates.
pub async fn create_affiliate_conversions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS affiliate_conversions (
            guid TEXT PRIMARY KEY,
            affiliate_id TEXT NOT NULL REFERENCES affiliates(guid) ON DELETE CASCADE,
            appointment_id TEXT REFERENCES appointments(guid) ON DELETE SET NULL,
            referral_code TEXT NOT NULL,
            conversion_type TEXT NOT NULL CHECK (conversion_type IN ('booking', 'sale')),
            sale_value REAL,
            commission_amount REAL,
            commission_status TEXT CHECK (commission_status IS NULL OR commission_status IN ('held', 'available', 'paid')),
            hold_until TIMESTAMP,
            created_at TIMESTAMP NOT NULL,
            CHECK (sale_value IS NULL OR sale_value >= 0.0),
            CHECK (commission_amount IS NULL OR commission_amount >= 0.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_conversions_appointment_type ON affiliate_conversions(appointment_id, conversion_type) WHERE appointment_id IS NOT NULL",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_conversions_affiliate ON affiliate_conversions(affiliate_id, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_conversions_release ON affiliate_conversions(commission_status, hold_until)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// This function ensures all required settings exist with default values.
/// It also handles NULL values by resetting them to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Commission ledger settings
    ensure_setting(pool, "commission_hold_days", "30").await?;
    ensure_setting(pool, "minimum_payout", "50").await?;
    ensure_setting(pool, "payout_schedule", "monthly").await?;

    // Lead qualification settings
    ensure_setting(pool, "qualification_threshold", "0").await?;

    // Outcomes considered final (no further contact expected)
    ensure_setting(
        pool,
        "terminal_outcomes",
        r#"["converted", "not_interested", "wrong_number"]"#,
    )
    .await?;

    // HTTP server settings
    ensure_setting(pool, "http_port", "5730").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE handles concurrent initialization: multiple
        // instances may pass the exists check simultaneously
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_schema_idempotent() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();

        init_schema(&pool).await.unwrap();
        // Second run must be a no-op, not an error
        init_schema(&pool).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = 'commission_hold_days'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_ensure_setting_resets_null() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_settings_table(&pool).await.unwrap();

        sqlx::query("INSERT INTO settings (key, value) VALUES ('commission_hold_days', NULL)")
            .execute(&pool)
            .await
            .unwrap();

        ensure_setting(&pool, "commission_hold_days", "30").await.unwrap();

        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'commission_hold_days'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(value, Some("30".to_string()));
    }

    #[tokio::test]
    async fn test_conversion_idempotency_key_rejects_duplicates() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO affiliates (guid, name, referral_code) VALUES ('a1', 'Aff', 'CODE1')",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO appointments \
             (guid, customer_name, customer_email, scheduled_at, created_at, updated_at) \
             VALUES ('appt1', 'Jane', 'jane@x.com', '2024-01-01T00:00:00+00:00', \
                     '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let insert = "INSERT INTO affiliate_conversions \
             (guid, affiliate_id, appointment_id, referral_code, conversion_type, sale_value, commission_amount, commission_status, hold_until, created_at) \
             VALUES (?, 'a1', 'appt1', 'CODE1', 'sale', 100.0, 10.0, 'held', '2024-02-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')";

        sqlx::query(insert).bind("c1").execute(&pool).await.unwrap();
        let dup = sqlx::query(insert).bind("c2").execute(&pool).await;
        assert!(dup.is_err(), "second sale for the same appointment must hit the unique index");

        // A booking row for the same appointment is still allowed
        sqlx::query(
            "INSERT INTO affiliate_conversions \
             (guid, affiliate_id, appointment_id, referral_code, conversion_type, created_at) \
             VALUES ('c3', 'a1', 'appt1', 'CODE1', 'booking', '2024-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .unwrap();
    }
}
