//! Reporting endpoints backed by the stats aggregator

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::api::ApiResult;
use crate::services::aggregator::{StatsAggregator, Timeline};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// GET /api/affiliates/:id/timeline?start=&end=
///
/// Defaults to the trailing 7 days. Responses flagged `approximate` used
/// the even-spread commission fallback and must not be reconciled against
/// the ledger.
pub async fn affiliate_timeline(
    State(state): State<AppState>,
    Path(affiliate_id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> ApiResult<Json<Timeline>> {
    let end = query.end.unwrap_or_else(Utc::now);
    let start = query.start.unwrap_or(end - Duration::days(7));

    let aggregator = StatsAggregator::new(state.db.clone());
    let timeline = aggregator.affiliate_timeline(&affiliate_id, start, end).await?;

    Ok(Json(timeline))
}
