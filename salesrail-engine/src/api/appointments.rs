//! Appointment endpoints
//!
//! Creation triggers round-robin assignment when no closer was booked
//! directly, and strict attribution decides whether the booking counts for
//! the tagged affiliate. Outcome updates feed the commission ledger.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesrail_common::db::models::Appointment;
use salesrail_common::db::settings;
use salesrail_common::types::AppointmentOutcome;
use salesrail_common::Error;

use crate::api::ApiResult;
use crate::db::{appointments, closers};
use crate::services::assigner::{AssignSweepSummary, RoundRobinAssigner};
use crate::services::attribution;
use crate::services::ledger::{CommissionLedger, OutcomeApplied, OutcomeUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub scheduled_at: DateTime<Utc>,
    pub affiliate_code: Option<String>,
    pub closer_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAppointmentResponse {
    pub appointment_id: String,
    pub status: String,
    pub closer_id: Option<String>,
    pub attributed_booking: bool,
}

/// POST /api/appointments
pub async fn create_appointment(
    State(state): State<AppState>,
    Json(req): Json<CreateAppointmentRequest>,
) -> ApiResult<Json<CreateAppointmentResponse>> {
    if req.customer_name.trim().is_empty() || req.customer_email.trim().is_empty() {
        return Err(
            Error::InvalidInput("customer_name and customer_email are required".to_string()).into(),
        );
    }

    // A directly booked closer must exist before any state mutation
    if let Some(closer_id) = req.closer_id.as_deref() {
        closers::fetch_closer(&state.db, closer_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("closer {}", closer_id)))?;
    }

    let now = Utc::now();
    let appointment_id = appointments::insert_appointment(
        &state.db,
        req.customer_name.trim(),
        req.customer_email.trim(),
        req.scheduled_at,
        req.affiliate_code.as_deref(),
        req.closer_id.as_deref(),
        now,
    )
    .await?;

    let assigned_closer = match req.closer_id {
        Some(closer_id) => {
            // Direct bookings still count toward the closer's call load
            sqlx::query(
                "UPDATE closers SET total_calls = total_calls + 1, updated_at = ? WHERE guid = ?",
            )
            .bind(now)
            .bind(&closer_id)
            .execute(&state.db)
            .await
            .map_err(Error::Database)?;
            Some(closer_id)
        }
        None => {
            let assigner = RoundRobinAssigner::new(state.db.clone());
            assigner.assign(&appointment_id).await?
        }
    };

    // Strict booking attribution: only quiz-lead emails count
    let mut attributed_booking = false;
    if let Some(code) = req.affiliate_code.as_deref() {
        if let Some(affiliate) = attribution::resolve_affiliate(&state.db, code).await? {
            let min_answers = settings::get_qualification_threshold(&state.db).await? as usize;
            let lead_emails = attribution::lead_emails(&state.db, &affiliate, min_answers).await?;
            let appointment = appointments::fetch_appointment(&state.db, &appointment_id)
                .await?
                .ok_or_else(|| Error::Internal("appointment vanished after insert".to_string()))?;

            if attribution::is_affiliate_booking(&appointment, &lead_emails) {
                let ledger = CommissionLedger::new(state.db.clone());
                attributed_booking = ledger.record_booking(&affiliate, &appointment_id, now).await?;
            }
        }
    }

    let status = if assigned_closer.is_some() { "confirmed" } else { "pending" };

    Ok(Json(CreateAppointmentResponse {
        appointment_id,
        status: status.to_string(),
        closer_id: assigned_closer,
        attributed_booking,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOutcomeRequest {
    pub outcome: String,
    pub sale_value: Option<f64>,
    pub notes: Option<String>,
    pub recording_link: Option<String>,
}

/// POST /api/appointments/:id/outcome
pub async fn update_outcome(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Json(req): Json<UpdateOutcomeRequest>,
) -> ApiResult<Json<OutcomeApplied>> {
    // Reject unknown outcomes before any state mutation
    let outcome: AppointmentOutcome = req.outcome.parse()?;

    let ledger = CommissionLedger::new(state.db.clone());
    let applied = ledger
        .apply_outcome(
            &appointment_id,
            OutcomeUpdate {
                outcome,
                sale_value: req.sale_value,
                notes: req.notes,
                recording_link: req.recording_link,
            },
            Utc::now(),
        )
        .await?;

    Ok(Json(applied))
}

#[derive(Debug, Serialize)]
pub struct UnassignedResponse {
    pub appointments: Vec<Appointment>,
}

/// GET /api/appointments/unassigned
///
/// Reporting surface for the reconciliation pass over appointments the
/// assigner could not place.
pub async fn list_unassigned(
    State(state): State<AppState>,
) -> ApiResult<Json<UnassignedResponse>> {
    let unassigned = appointments::list_unassigned(&state.db).await?;
    Ok(Json(UnassignedResponse { appointments: unassigned }))
}

/// POST /api/appointments/assign-pending
pub async fn assign_pending(
    State(state): State<AppState>,
) -> ApiResult<Json<AssignSweepSummary>> {
    let assigner = RoundRobinAssigner::new(state.db.clone());
    let summary = assigner.assign_pending().await?;
    Ok(Json(summary))
}
