//! Quiz funnel endpoints
//!
//! Question authoring with explicit semantic roles, session lifecycle, and
//! the completion hook that qualifies the session as a lead and refreshes
//! the owning affiliate's deduped lead count.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use salesrail_common::db::settings;
use salesrail_common::types::QuestionRole;
use salesrail_common::Error;

use crate::api::ApiResult;
use crate::db::{affiliates, sessions};
use crate::services::{attribution, dedup, qualifier};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub prompt: String,
    pub role: String,
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateQuestionResponse {
    pub question_id: String,
}

/// POST /api/quiz/questions
pub async fn create_question(
    State(state): State<AppState>,
    Json(req): Json<CreateQuestionRequest>,
) -> ApiResult<Json<CreateQuestionResponse>> {
    if req.prompt.trim().is_empty() {
        return Err(Error::InvalidInput("question prompt must not be empty".to_string()).into());
    }
    let role: QuestionRole = req.role.parse()?;

    let question_id = sessions::insert_question(&state.db, &req.prompt, role, req.position).await?;

    Ok(Json(CreateQuestionResponse { question_id }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    pub affiliate_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
}

/// POST /api/quiz/sessions
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<Json<StartSessionResponse>> {
    let session_id =
        sessions::insert_session(&state.db, req.affiliate_code.as_deref(), Utc::now()).await?;

    Ok(Json(StartSessionResponse { session_id }))
}

#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    pub question_id: String,
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordAnswerResponse {
    pub session_id: String,
    pub question_id: String,
}

/// POST /api/quiz/sessions/:id/answers
pub async fn record_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<RecordAnswerRequest>,
) -> ApiResult<Json<RecordAnswerResponse>> {
    let session = sessions::fetch_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;

    // Completed sessions are immutable
    if session.status == "completed" {
        return Err(Error::Conflict("session is already completed".to_string()).into());
    }

    sessions::upsert_answer(&state.db, &session_id, &req.question_id, req.value.as_deref()).await?;

    Ok(Json(RecordAnswerResponse { session_id, question_id: req.question_id }))
}

#[derive(Debug, Serialize)]
pub struct CompleteSessionResponse {
    pub session_id: String,
    pub is_lead: bool,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// POST /api/quiz/sessions/:id/complete
///
/// Marks the session completed, qualifies it, and refreshes the owning
/// affiliate's deduped lead count when the session qualifies.
pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<CompleteSessionResponse>> {
    let session = sessions::fetch_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;

    sessions::mark_completed(&state.db, &session_id, Utc::now()).await?;

    let min_answers = settings::get_qualification_threshold(&state.db).await? as usize;
    let answers = sessions::fetch_role_answers(&state.db, &session_id).await?;
    let check =
        qualifier::qualify(salesrail_common::types::SessionStatus::Completed, &answers, min_answers);

    if check.is_lead {
        if let Some(code) = session.affiliate_code.as_deref() {
            if let Some(affiliate) = attribution::resolve_affiliate(&state.db, code).await? {
                let deduped =
                    dedup::leads_for_affiliate_code(&state.db, &affiliate.referral_code, min_answers)
                        .await?;
                affiliates::set_total_leads(&state.db, &affiliate.guid, deduped.len() as i64).await?;

                info!(
                    session_id,
                    affiliate_id = %affiliate.guid,
                    total_leads = deduped.len(),
                    "Qualified lead attributed to affiliate"
                );
            }
        }
    }

    Ok(Json(CompleteSessionResponse {
        session_id,
        is_lead: check.is_lead,
        name: check.name,
        email: check.email,
    }))
}
