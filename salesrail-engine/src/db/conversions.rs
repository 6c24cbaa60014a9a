//! Affiliate conversion queries

use sqlx::{Pool, Sqlite};

use salesrail_common::db::models::AffiliateConversion;
use salesrail_common::Result;

const CONVERSION_COLUMNS: &str = "guid, affiliate_id, appointment_id, referral_code, conversion_type, \
     sale_value, commission_amount, commission_status, hold_until, created_at";

/// Fetch one conversion by id
pub async fn fetch_conversion(
    db: &Pool<Sqlite>,
    conversion_id: &str,
) -> Result<Option<AffiliateConversion>> {
    let conversion = sqlx::query_as::<_, AffiliateConversion>(&format!(
        "SELECT {} FROM affiliate_conversions WHERE guid = ?",
        CONVERSION_COLUMNS
    ))
    .bind(conversion_id)
    .fetch_optional(db)
    .await?;

    Ok(conversion)
}

/// List conversions, optionally scoped to one affiliate
pub async fn list_conversions(
    db: &Pool<Sqlite>,
    affiliate_id: Option<&str>,
) -> Result<Vec<AffiliateConversion>> {
    let conversions = match affiliate_id {
        Some(affiliate_id) => {
            sqlx::query_as::<_, AffiliateConversion>(&format!(
                "SELECT {} FROM affiliate_conversions WHERE affiliate_id = ? ORDER BY created_at DESC",
                CONVERSION_COLUMNS
            ))
            .bind(affiliate_id)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as::<_, AffiliateConversion>(&format!(
                "SELECT {} FROM affiliate_conversions ORDER BY created_at DESC",
                CONVERSION_COLUMNS
            ))
            .fetch_all(db)
            .await?
        }
    };

    Ok(conversions)
}

/// Sum of commission already paid out to one affiliate
pub async fn paid_commission_total(db: &Pool<Sqlite>, affiliate_id: &str) -> Result<f64> {
    let total: Option<f64> = sqlx::query_scalar(
        "SELECT SUM(commission_amount) FROM affiliate_conversions \
         WHERE affiliate_id = ? AND conversion_type = 'sale' AND commission_status = 'paid'",
    )
    .bind(affiliate_id)
    .fetch_one(db)
    .await?;

    Ok(total.unwrap_or(0.0))
}
