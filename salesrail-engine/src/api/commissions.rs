//! Commission ledger endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use salesrail_common::db::models::AffiliateConversion;
use salesrail_common::db::settings;

use crate::api::ApiResult;
use crate::db::conversions;
use crate::services::ledger::{CommissionLedger, ReleaseSummary};
use crate::AppState;

/// POST /api/commissions/release-sweep
///
/// Externally triggered (cron or manual); idempotent, safe to re-run.
pub async fn release_sweep(State(state): State<AppState>) -> ApiResult<Json<ReleaseSummary>> {
    let ledger = CommissionLedger::new(state.db.clone());
    let summary = ledger.release_due(Utc::now()).await?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub conversion_id: String,
    pub commission_status: String,
}

/// POST /api/commissions/:id/force-release
pub async fn force_release(
    State(state): State<AppState>,
    Path(conversion_id): Path<String>,
) -> ApiResult<Json<TransitionResponse>> {
    let ledger = CommissionLedger::new(state.db.clone());
    ledger.force_release(&conversion_id).await?;

    Ok(Json(TransitionResponse {
        conversion_id,
        commission_status: "available".to_string(),
    }))
}

/// POST /api/commissions/:id/mark-paid
pub async fn mark_paid(
    State(state): State<AppState>,
    Path(conversion_id): Path<String>,
) -> ApiResult<Json<TransitionResponse>> {
    let ledger = CommissionLedger::new(state.db.clone());
    ledger.mark_paid(&conversion_id).await?;

    Ok(Json(TransitionResponse {
        conversion_id,
        commission_status: "paid".to_string(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListConversionsQuery {
    pub affiliate_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListConversionsResponse {
    pub conversions: Vec<AffiliateConversion>,
}

/// GET /api/commissions?affiliate_id=
pub async fn list_conversions(
    State(state): State<AppState>,
    Query(query): Query<ListConversionsQuery>,
) -> ApiResult<Json<ListConversionsResponse>> {
    let conversions = conversions::list_conversions(&state.db, query.affiliate_id.as_deref()).await?;
    Ok(Json(ListConversionsResponse { conversions }))
}

#[derive(Debug, Serialize)]
pub struct PayoutConfigResponse {
    pub minimum_payout: f64,
    pub payout_schedule: String,
}

/// GET /api/settings/payout
///
/// Exposes payout configuration to the external payout processor.
pub async fn payout_config(State(state): State<AppState>) -> ApiResult<Json<PayoutConfigResponse>> {
    let minimum_payout = settings::get_minimum_payout(&state.db).await?;
    let payout_schedule = settings::get_payout_schedule(&state.db).await?;

    Ok(Json(PayoutConfigResponse { minimum_payout, payout_schedule }))
}
