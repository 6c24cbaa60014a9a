//! Closer endpoints: creation, scan-derived stats, counter reconciliation

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use salesrail_common::Error;

use crate::api::ApiResult;
use crate::db::closers;
use crate::services::reconcile::{self, ScannedCloserStats};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCloserRequest {
    pub name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateCloserResponse {
    pub closer_id: String,
}

/// POST /api/closers
pub async fn create_closer(
    State(state): State<AppState>,
    Json(req): Json<CreateCloserRequest>,
) -> ApiResult<Json<CreateCloserResponse>> {
    if req.name.trim().is_empty() {
        return Err(Error::InvalidInput("closer name must not be empty".to_string()).into());
    }

    let closer_id =
        closers::insert_closer(&state.db, req.name.trim(), req.email.as_deref(), req.is_approved)
            .await?;

    Ok(Json(CreateCloserResponse { closer_id }))
}

#[derive(Debug, Serialize)]
pub struct CloserStatsResponse {
    pub closer_id: String,
    pub name: String,
    pub total_calls: i64,
    pub total_conversions: i64,
    pub total_revenue: f64,
    pub conversion_rate: f64,
}

/// GET /api/closers/:id/stats
///
/// Stats are scan-derived; reading them also resynchronizes any drifted
/// cached counters.
pub async fn closer_stats(
    State(state): State<AppState>,
    Path(closer_id): Path<String>,
) -> ApiResult<Json<CloserStatsResponse>> {
    let closer = closers::fetch_closer(&state.db, &closer_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("closer {}", closer_id)))?;

    let scanned = reconcile::sync_closer_stats(&state.db, &closer_id).await?;

    Ok(Json(CloserStatsResponse {
        closer_id,
        name: closer.name,
        total_calls: scanned.total_calls,
        total_conversions: scanned.total_conversions,
        total_revenue: scanned.total_revenue,
        conversion_rate: scanned.conversion_rate,
    }))
}

#[derive(Debug, Serialize)]
pub struct ReconcileCloserResponse {
    pub closer_id: String,
    pub stats: ScannedCloserStats,
}

/// POST /api/closers/:id/reconcile
pub async fn reconcile_closer(
    State(state): State<AppState>,
    Path(closer_id): Path<String>,
) -> ApiResult<Json<ReconcileCloserResponse>> {
    let stats = reconcile::sync_closer_stats(&state.db, &closer_id).await?;

    Ok(Json(ReconcileCloserResponse { closer_id, stats }))
}
