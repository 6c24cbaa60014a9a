//! Affiliate endpoints: creation, click tracking, stats outputs

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use salesrail_common::Error;

use crate::api::ApiResult;
use crate::db::{affiliates, conversions};
use crate::services::attribution;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAffiliateRequest {
    pub name: String,
    pub referral_code: String,
    pub custom_link: Option<String>,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
    #[serde(default = "default_tier")]
    pub tier: String,
}

fn default_commission_rate() -> f64 {
    0.1
}

fn default_tier() -> String {
    "standard".to_string()
}

#[derive(Debug, Serialize)]
pub struct CreateAffiliateResponse {
    pub affiliate_id: String,
    pub referral_code: String,
}

/// POST /api/affiliates
pub async fn create_affiliate(
    State(state): State<AppState>,
    Json(req): Json<CreateAffiliateRequest>,
) -> ApiResult<Json<CreateAffiliateResponse>> {
    if req.referral_code.trim().is_empty() {
        return Err(Error::InvalidInput("referral_code must not be empty".to_string()).into());
    }
    if !(0.0..=1.0).contains(&req.commission_rate) {
        return Err(
            Error::InvalidInput("commission_rate must be a fraction between 0 and 1".to_string())
                .into(),
        );
    }

    let affiliate_id = affiliates::insert_affiliate(
        &state.db,
        &req.name,
        req.referral_code.trim(),
        req.custom_link.as_deref(),
        req.commission_rate,
        &req.tier,
    )
    .await?;

    Ok(Json(CreateAffiliateResponse {
        affiliate_id,
        referral_code: req.referral_code.trim().to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct TrackClickResponse {
    pub attributed: bool,
    pub affiliate_id: Option<String>,
}

/// GET /api/track/:code
///
/// Records one click against the resolved affiliate. Unknown codes are
/// organic traffic and still answer 200.
pub async fn track_click(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<TrackClickResponse>> {
    match attribution::resolve_affiliate(&state.db, &code).await? {
        Some(affiliate) => {
            affiliates::record_click(&state.db, &affiliate.guid, &affiliate.referral_code, Utc::now())
                .await?;
            Ok(Json(TrackClickResponse { attributed: true, affiliate_id: Some(affiliate.guid) }))
        }
        None => {
            debug!(code, "Click with unresolved code, counted as organic");
            Ok(Json(TrackClickResponse { attributed: false, affiliate_id: None }))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AffiliateStatsResponse {
    pub affiliate_id: String,
    pub referral_code: String,
    pub tier: String,
    pub total_clicks: i64,
    pub total_leads: i64,
    pub total_bookings: i64,
    pub total_sales: i64,
    pub total_commission: f64,
    pub total_paid_commission: f64,
}

/// GET /api/affiliates/:id/stats
pub async fn affiliate_stats(
    State(state): State<AppState>,
    Path(affiliate_id): Path<String>,
) -> ApiResult<Json<AffiliateStatsResponse>> {
    let affiliate = affiliates::fetch_affiliate(&state.db, &affiliate_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("affiliate {}", affiliate_id)))?;

    let total_paid_commission = conversions::paid_commission_total(&state.db, &affiliate_id).await?;

    Ok(Json(AffiliateStatsResponse {
        affiliate_id: affiliate.guid,
        referral_code: affiliate.referral_code,
        tier: affiliate.tier,
        total_clicks: affiliate.total_clicks,
        total_leads: affiliate.total_leads,
        total_bookings: affiliate.total_bookings,
        total_sales: affiliate.total_sales,
        total_commission: affiliate.total_commission,
        total_paid_commission,
    }))
}
