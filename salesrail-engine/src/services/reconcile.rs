//! Counter reconciliation
//!
//! The cached aggregate counters on closers and affiliates are derived
//! caches of the appointment and conversion logs, not independent sources
//! of truth. This module recomputes them from scans and resynchronizes
//! cached rows that have drifted.

use serde::Serialize;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::warn;

use salesrail_common::{Error, Result};

use crate::db::{affiliates, closers, conversions};
use crate::services::{attribution, dedup};

/// Closer aggregates recomputed from that closer's appointments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedCloserStats {
    pub total_calls: i64,
    pub total_conversions: i64,
    pub total_revenue: f64,
    pub conversion_rate: f64,
}

/// Recompute closer aggregates by scanning the appointment log.
///
/// Takes a bare connection so ledger transactions can run the same scan
/// against their in-flight state.
pub async fn scan_closer_stats(
    conn: &mut SqliteConnection,
    closer_id: &str,
) -> Result<ScannedCloserStats> {
    let total_calls: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE closer_id = ?")
        .bind(closer_id)
        .fetch_one(&mut *conn)
        .await?;

    let total_conversions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM appointments WHERE closer_id = ? AND outcome = 'converted'",
    )
    .bind(closer_id)
    .fetch_one(&mut *conn)
    .await?;

    let total_revenue: Option<f64> = sqlx::query_scalar(
        "SELECT SUM(sale_value) FROM appointments WHERE closer_id = ? AND outcome = 'converted'",
    )
    .bind(closer_id)
    .fetch_one(&mut *conn)
    .await?;
    let total_revenue = total_revenue.unwrap_or(0.0);

    // Always a ratio of scanned values, never accumulated incrementally
    let conversion_rate = if total_calls > 0 {
        total_conversions as f64 / total_calls as f64
    } else {
        0.0
    };

    Ok(ScannedCloserStats { total_calls, total_conversions, total_revenue, conversion_rate })
}

/// Compare a closer's cached counters against a fresh scan and rewrite
/// them when they disagree. Returns the scanned truth either way.
pub async fn sync_closer_stats(db: &Pool<Sqlite>, closer_id: &str) -> Result<ScannedCloserStats> {
    let closer = closers::fetch_closer(db, closer_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("closer {}", closer_id)))?;

    let mut conn = db.acquire().await?;
    let scanned = scan_closer_stats(&mut *conn, closer_id).await?;

    let drifted = closer.total_calls != scanned.total_calls
        || closer.total_conversions != scanned.total_conversions
        || (closer.total_revenue - scanned.total_revenue).abs() > f64::EPSILON
        || (closer.conversion_rate - scanned.conversion_rate).abs() > f64::EPSILON;

    if drifted {
        warn!(
            closer_id,
            cached_calls = closer.total_calls,
            scanned_calls = scanned.total_calls,
            cached_conversions = closer.total_conversions,
            scanned_conversions = scanned.total_conversions,
            "Closer counters drifted from appointment log, resynchronizing"
        );

        sqlx::query(
            "UPDATE closers \
             SET total_calls = ?, total_conversions = ?, total_revenue = ?, conversion_rate = ?, \
                 updated_at = CURRENT_TIMESTAMP \
             WHERE guid = ?",
        )
        .bind(scanned.total_calls)
        .bind(scanned.total_conversions)
        .bind(scanned.total_revenue)
        .bind(scanned.conversion_rate)
        .bind(closer_id)
        .execute(db)
        .await?;
    }

    Ok(scanned)
}

/// Affiliate aggregates recomputed from the click, session, and
/// conversion logs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedAffiliateStats {
    pub total_clicks: i64,
    pub total_leads: i64,
    pub total_bookings: i64,
    pub total_sales: i64,
    pub total_commission: f64,
}

/// Recompute affiliate aggregates from the event logs
pub async fn scan_affiliate_stats(
    db: &Pool<Sqlite>,
    affiliate_id: &str,
    min_answers: usize,
) -> Result<ScannedAffiliateStats> {
    let affiliate = affiliates::fetch_affiliate(db, affiliate_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("affiliate {}", affiliate_id)))?;

    let total_clicks: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM affiliate_clicks WHERE affiliate_id = ?")
            .bind(affiliate_id)
            .fetch_one(db)
            .await?;

    let total_leads =
        dedup::leads_for_affiliate_code(db, &affiliate.referral_code, min_answers).await?.len() as i64;

    let lead_emails = attribution::lead_emails(db, &affiliate, min_answers).await?;
    let tagged = crate::db::appointments::fetch_for_affiliate_code(db, &affiliate.referral_code).await?;
    let total_bookings = tagged
        .iter()
        .filter(|a| attribution::is_affiliate_booking(a, &lead_emails))
        .count() as i64;

    let sale_rows = conversions::list_conversions(db, Some(affiliate_id)).await?;
    let mut total_sales = 0;
    let mut total_commission = 0.0;
    for conversion in sale_rows.iter().filter(|c| c.conversion_type == "sale") {
        total_sales += 1;
        total_commission += conversion.commission_amount.unwrap_or(0.0);
    }

    Ok(ScannedAffiliateStats {
        total_clicks,
        total_leads,
        total_bookings,
        total_sales,
        total_commission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use salesrail_common::db::init::init_schema;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_scan_closer_stats_from_appointments() {
        let pool = setup_test_db().await;
        let closer = crate::db::closers::insert_closer(&pool, "Alice", None, true)
            .await
            .unwrap();

        for (outcome, sale) in [
            (Some("converted"), Some(100.0)),
            (Some("converted"), Some(250.0)),
            (Some("not_interested"), None),
            (None, None),
        ] {
            let appt = crate::db::appointments::insert_appointment(
                &pool,
                "Jane",
                "jane@x.com",
                Utc::now(),
                None,
                Some(&closer),
                Utc::now(),
            )
            .await
            .unwrap();
            if let Some(outcome) = outcome {
                sqlx::query("UPDATE appointments SET outcome = ?, sale_value = ? WHERE guid = ?")
                    .bind(outcome)
                    .bind(sale)
                    .bind(&appt)
                    .execute(&pool)
                    .await
                    .unwrap();
            }
        }

        let mut conn = pool.acquire().await.unwrap();
        let scanned = scan_closer_stats(&mut *conn, &closer).await.unwrap();
        assert_eq!(scanned.total_calls, 4);
        assert_eq!(scanned.total_conversions, 2);
        assert_eq!(scanned.total_revenue, 350.0);
        assert_eq!(scanned.conversion_rate, 0.5);
    }

    #[tokio::test]
    async fn test_sync_rewrites_drifted_counters() {
        let pool = setup_test_db().await;
        let closer = crate::db::closers::insert_closer(&pool, "Alice", None, true)
            .await
            .unwrap();

        // Fabricate drift in the cached counters
        sqlx::query("UPDATE closers SET total_calls = 99, total_conversions = 50, total_revenue = 1234.0 WHERE guid = ?")
            .bind(&closer)
            .execute(&pool)
            .await
            .unwrap();

        let scanned = sync_closer_stats(&pool, &closer).await.unwrap();
        assert_eq!(scanned.total_calls, 0);

        let row = crate::db::closers::fetch_closer(&pool, &closer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.total_calls, 0);
        assert_eq!(row.total_conversions, 0);
        assert_eq!(row.total_revenue, 0.0);
        assert_eq!(row.conversion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_sync_missing_closer_is_not_found() {
        let pool = setup_test_db().await;
        let err = sync_closer_stats(&pool, "nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
