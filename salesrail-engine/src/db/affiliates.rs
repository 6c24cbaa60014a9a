//! Affiliate queries

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use salesrail_common::db::models::Affiliate;
use salesrail_common::Result;

const AFFILIATE_COLUMNS: &str = "guid, name, referral_code, custom_link, commission_rate, tier, \
     total_clicks, total_leads, total_bookings, total_sales, total_commission, \
     is_approved, is_active";

/// Insert a new affiliate. The custom link is normalized to '/code' form.
pub async fn insert_affiliate(
    db: &Pool<Sqlite>,
    name: &str,
    referral_code: &str,
    custom_link: Option<&str>,
    commission_rate: f64,
    tier: &str,
) -> Result<String> {
    let guid = Uuid::new_v4().to_string();
    let custom_link = custom_link.map(|link| {
        if link.starts_with('/') {
            link.to_string()
        } else {
            format!("/{}", link)
        }
    });

    sqlx::query(
        "INSERT INTO affiliates (guid, name, referral_code, custom_link, commission_rate, tier, is_approved) \
         VALUES (?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(&guid)
    .bind(name)
    .bind(referral_code)
    .bind(custom_link)
    .bind(commission_rate)
    .bind(tier)
    .execute(db)
    .await?;

    Ok(guid)
}

/// Fetch one affiliate by id
pub async fn fetch_affiliate(db: &Pool<Sqlite>, affiliate_id: &str) -> Result<Option<Affiliate>> {
    let affiliate = sqlx::query_as::<_, Affiliate>(&format!(
        "SELECT {} FROM affiliates WHERE guid = ?",
        AFFILIATE_COLUMNS
    ))
    .bind(affiliate_id)
    .fetch_optional(db)
    .await?;

    Ok(affiliate)
}

/// Fetch an affiliate by exact referral code
pub async fn fetch_by_referral_code(db: &Pool<Sqlite>, code: &str) -> Result<Option<Affiliate>> {
    let affiliate = sqlx::query_as::<_, Affiliate>(&format!(
        "SELECT {} FROM affiliates WHERE referral_code = ?",
        AFFILIATE_COLUMNS
    ))
    .bind(code)
    .fetch_optional(db)
    .await?;

    Ok(affiliate)
}

/// Fetch an affiliate by custom tracking link (stored as '/code')
pub async fn fetch_by_custom_link(db: &Pool<Sqlite>, link: &str) -> Result<Option<Affiliate>> {
    let affiliate = sqlx::query_as::<_, Affiliate>(&format!(
        "SELECT {} FROM affiliates WHERE custom_link = ?",
        AFFILIATE_COLUMNS
    ))
    .bind(link)
    .fetch_optional(db)
    .await?;

    Ok(affiliate)
}

/// Record one click event and bump the cached click counter
pub async fn record_click(
    db: &Pool<Sqlite>,
    affiliate_id: &str,
    referral_code: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query(
        "INSERT INTO affiliate_clicks (guid, affiliate_id, referral_code, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(affiliate_id)
    .bind(referral_code)
    .bind(at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE affiliates SET total_clicks = total_clicks + 1, updated_at = ? WHERE guid = ?",
    )
    .bind(at)
    .bind(affiliate_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

/// Overwrite the cached deduped lead count
pub async fn set_total_leads(db: &Pool<Sqlite>, affiliate_id: &str, total_leads: i64) -> Result<()> {
    sqlx::query("UPDATE affiliates SET total_leads = ?, updated_at = ? WHERE guid = ?")
        .bind(total_leads)
        .bind(Utc::now())
        .bind(affiliate_id)
        .execute(db)
        .await?;

    Ok(())
}

/// Count clicks for an affiliate inside a time window
pub async fn count_clicks_in_window(
    db: &Pool<Sqlite>,
    affiliate_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM affiliate_clicks \
         WHERE affiliate_id = ? AND created_at >= ? AND created_at < ?",
    )
    .bind(affiliate_id)
    .bind(start)
    .bind(end)
    .fetch_one(db)
    .await?;

    Ok(count)
}
