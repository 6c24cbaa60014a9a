//! Time-bucketed reporting rollups
//!
//! Read-only. Buckets clicks, deduped leads, attributed bookings, and sale
//! commission hourly for single-day ranges and daily for longer ranges.
//!
//! Output is for dashboards only. When per-event data predates tracking,
//! the even-spread fallback fabricates a plausible commission shape, so
//! callers must never reconcile these numbers against the ledger; the
//! conversions table stays the source of truth.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::warn;

use salesrail_common::db::settings;
use salesrail_common::{Error, Result};

use crate::db::{affiliates, appointments, conversions};
use crate::services::{attribution, dedup};

/// Stats aggregator over the shared store
pub struct StatsAggregator {
    db: Pool<Sqlite>,
}

/// One time bucket of affiliate activity
#[derive(Debug, Clone, Serialize)]
pub struct BucketStats {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub clicks: i64,
    pub leads: i64,
    pub bookings: i64,
    pub commission: f64,
}

/// A bucketed affiliate timeline
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub affiliate_id: String,
    pub buckets: Vec<BucketStats>,
    /// True when the even-spread commission fallback fired
    pub approximate: bool,
}

impl StatsAggregator {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Build the bucketed timeline for one affiliate over [start, end)
    pub async fn affiliate_timeline(
        &self,
        affiliate_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Timeline> {
        if end <= start {
            return Err(Error::InvalidInput("timeline end must be after start".to_string()));
        }

        let affiliate = affiliates::fetch_affiliate(&self.db, affiliate_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("affiliate {}", affiliate_id)))?;

        // Hourly buckets for a single-day range, daily otherwise
        let step = if end - start <= Duration::days(1) {
            Duration::hours(1)
        } else {
            Duration::days(1)
        };

        let min_answers = settings::get_qualification_threshold(&self.db).await? as usize;

        let leads = dedup::leads_for_affiliate_code(&self.db, &affiliate.referral_code, min_answers)
            .await?;
        let lead_emails = attribution::lead_emails(&self.db, &affiliate, min_answers).await?;
        let tagged = appointments::fetch_for_affiliate_code(&self.db, &affiliate.referral_code).await?;
        let sale_rows = conversions::list_conversions(&self.db, Some(affiliate_id)).await?;

        let mut buckets = Vec::new();
        let mut bucket_start = start;
        while bucket_start < end {
            let bucket_end = (bucket_start + step).min(end);

            let clicks = affiliates::count_clicks_in_window(
                &self.db,
                affiliate_id,
                bucket_start,
                bucket_end,
            )
            .await?;

            let lead_count = leads
                .iter()
                .filter(|l| {
                    let at = l.completed_at.unwrap_or(l.started_at);
                    at >= bucket_start && at < bucket_end
                })
                .count() as i64;

            let bookings = tagged
                .iter()
                .filter(|a| a.created_at >= bucket_start && a.created_at < bucket_end)
                .filter(|a| attribution::is_affiliate_booking(a, &lead_emails))
                .count() as i64;

            let commission: f64 = sale_rows
                .iter()
                .filter(|c| c.conversion_type == "sale")
                .filter(|c| c.created_at >= bucket_start && c.created_at < bucket_end)
                .filter_map(|c| c.commission_amount)
                .sum();

            buckets.push(BucketStats {
                start: bucket_start,
                end: bucket_end,
                clicks,
                leads: lead_count,
                bookings,
                commission,
            });

            bucket_start = bucket_end;
        }

        // Fallback for data that predates per-event tracking: the affiliate
        // carries commission but no windowed conversion matched, so spread
        // the total evenly across buckets that saw any activity
        let windowed_commission: f64 = buckets.iter().map(|b| b.commission).sum();
        let mut approximate = false;

        if affiliate.total_commission > 0.0 && windowed_commission == 0.0 {
            let active: Vec<usize> = buckets
                .iter()
                .enumerate()
                .filter(|(_, b)| b.clicks > 0 || b.bookings > 0)
                .map(|(i, _)| i)
                .collect();

            if !active.is_empty() {
                let share = affiliate.total_commission / active.len() as f64;
                for i in active {
                    buckets[i].commission = share;
                }
                approximate = true;
                warn!(
                    affiliate_id,
                    total_commission = affiliate.total_commission,
                    "No windowed conversions matched, spreading commission across active buckets"
                );
            }
        }

        Ok(Timeline { affiliate_id: affiliate_id.to_string(), buckets, approximate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use salesrail_common::db::init::init_schema;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    fn ts(s: &str) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(
            s[0..4].parse().unwrap(),
            s[5..7].parse().unwrap(),
            s[8..10].parse().unwrap(),
            s[11..13].parse().unwrap(),
            0,
            0,
        )
        .unwrap()
    }

    async fn seed_affiliate(pool: &SqlitePool) -> String {
        crate::db::affiliates::insert_affiliate(pool, "Aff", "P1", None, 0.1, "standard")
            .await
            .unwrap()
    }

    async fn seed_click(pool: &SqlitePool, affiliate_id: &str, at: DateTime<Utc>) {
        sqlx::query(
            "INSERT INTO affiliate_clicks (guid, affiliate_id, referral_code, created_at) \
             VALUES (?, ?, 'P1', ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(affiliate_id)
        .bind(at)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_single_day_range_buckets_hourly() {
        let pool = setup_test_db().await;
        let affiliate = seed_affiliate(&pool).await;
        let aggregator = StatsAggregator::new(pool.clone());

        let timeline = aggregator
            .affiliate_timeline(&affiliate, ts("2024-03-01 00"), ts("2024-03-02 00"))
            .await
            .unwrap();
        assert_eq!(timeline.buckets.len(), 24);
    }

    #[tokio::test]
    async fn test_multi_day_range_buckets_daily() {
        let pool = setup_test_db().await;
        let affiliate = seed_affiliate(&pool).await;
        let aggregator = StatsAggregator::new(pool.clone());

        let timeline = aggregator
            .affiliate_timeline(&affiliate, ts("2024-03-01 00"), ts("2024-03-08 00"))
            .await
            .unwrap();
        assert_eq!(timeline.buckets.len(), 7);
        assert!(!timeline.approximate);
    }

    #[tokio::test]
    async fn test_clicks_land_in_their_window() {
        let pool = setup_test_db().await;
        let affiliate = seed_affiliate(&pool).await;
        let aggregator = StatsAggregator::new(pool.clone());

        seed_click(&pool, &affiliate, ts("2024-03-01 10")).await;
        seed_click(&pool, &affiliate, ts("2024-03-01 10")).await;
        seed_click(&pool, &affiliate, ts("2024-03-03 15")).await;

        let timeline = aggregator
            .affiliate_timeline(&affiliate, ts("2024-03-01 00"), ts("2024-03-05 00"))
            .await
            .unwrap();

        assert_eq!(timeline.buckets[0].clicks, 2);
        assert_eq!(timeline.buckets[1].clicks, 0);
        assert_eq!(timeline.buckets[2].clicks, 1);
    }

    #[tokio::test]
    async fn test_even_spread_fallback_marks_approximate() {
        let pool = setup_test_db().await;
        let affiliate = seed_affiliate(&pool).await;
        let aggregator = StatsAggregator::new(pool.clone());

        // Migrated-era affiliate: commission on the books, no conversion rows
        sqlx::query("UPDATE affiliates SET total_commission = 90.0 WHERE guid = ?")
            .bind(&affiliate)
            .execute(&pool)
            .await
            .unwrap();

        seed_click(&pool, &affiliate, ts("2024-03-01 10")).await;
        seed_click(&pool, &affiliate, ts("2024-03-03 09")).await;
        seed_click(&pool, &affiliate, ts("2024-03-04 12")).await;

        let timeline = aggregator
            .affiliate_timeline(&affiliate, ts("2024-03-01 00"), ts("2024-03-06 00"))
            .await
            .unwrap();

        assert!(timeline.approximate);
        let spread: Vec<f64> = timeline.buckets.iter().map(|b| b.commission).collect();
        assert_eq!(spread, vec![30.0, 0.0, 30.0, 30.0, 0.0]);
    }

    #[tokio::test]
    async fn test_no_fallback_when_windowed_commission_exists() {
        let pool = setup_test_db().await;
        let affiliate = seed_affiliate(&pool).await;
        let aggregator = StatsAggregator::new(pool.clone());

        sqlx::query("UPDATE affiliates SET total_commission = 25.0 WHERE guid = ?")
            .bind(&affiliate)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO affiliate_conversions \
             (guid, affiliate_id, referral_code, conversion_type, sale_value, commission_amount, \
              commission_status, hold_until, created_at) \
             VALUES (?, ?, 'P1', 'sale', 250.0, 25.0, 'held', ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&affiliate)
        .bind(ts("2024-04-01 00"))
        .bind(ts("2024-03-02 12"))
        .execute(&pool)
        .await
        .unwrap();

        let timeline = aggregator
            .affiliate_timeline(&affiliate, ts("2024-03-01 00"), ts("2024-03-04 00"))
            .await
            .unwrap();

        assert!(!timeline.approximate);
        assert_eq!(timeline.buckets[1].commission, 25.0);
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let pool = setup_test_db().await;
        let affiliate = seed_affiliate(&pool).await;
        let aggregator = StatsAggregator::new(pool.clone());

        let err = aggregator
            .affiliate_timeline(&affiliate, ts("2024-03-05 00"), ts("2024-03-01 00"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
