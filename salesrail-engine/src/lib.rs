//! salesrail-engine library - Lead Attribution & Commission Ledger Engine
//!
//! Attributes quiz-funnel traffic to affiliates, routes booked calls to
//! closers round-robin, and maintains the held/available/paid commission
//! ledger with duplicate protection.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod services;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        // Quiz funnel
        .route("/api/quiz/questions", post(api::quiz::create_question))
        .route("/api/quiz/sessions", post(api::quiz::start_session))
        .route("/api/quiz/sessions/:id/answers", post(api::quiz::record_answer))
        .route("/api/quiz/sessions/:id/complete", post(api::quiz::complete_session))
        // Affiliate tracking
        .route("/api/track/:code", get(api::affiliates::track_click))
        .route("/api/affiliates", post(api::affiliates::create_affiliate))
        .route("/api/affiliates/:id/stats", get(api::affiliates::affiliate_stats))
        .route("/api/affiliates/:id/timeline", get(api::stats::affiliate_timeline))
        // Closers
        .route("/api/closers", post(api::closers::create_closer))
        .route("/api/closers/:id/stats", get(api::closers::closer_stats))
        .route("/api/closers/:id/reconcile", post(api::closers::reconcile_closer))
        // Appointments
        .route("/api/appointments", post(api::appointments::create_appointment))
        .route("/api/appointments/unassigned", get(api::appointments::list_unassigned))
        .route("/api/appointments/assign-pending", post(api::appointments::assign_pending))
        .route("/api/appointments/:id/outcome", post(api::appointments::update_outcome))
        // Commission ledger
        .route("/api/commissions", get(api::commissions::list_conversions))
        .route("/api/commissions/release-sweep", post(api::commissions::release_sweep))
        .route("/api/commissions/:id/force-release", post(api::commissions::force_release))
        .route("/api/commissions/:id/mark-paid", post(api::commissions::mark_paid))
        .route("/api/settings/payout", get(api::commissions::payout_config));

    Router::new()
        .merge(api)
        .merge(api::health::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
