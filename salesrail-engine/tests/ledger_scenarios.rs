//! End-to-end ledger and funnel scenarios driven at the service layer
//! against an in-memory database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;

use salesrail_common::db::init::init_schema;
use salesrail_common::types::{AppointmentOutcome, SessionStatus};

use salesrail_engine::db::{affiliates, appointments, closers, conversions, sessions};
use salesrail_engine::services::assigner::RoundRobinAssigner;
use salesrail_engine::services::dedup;
use salesrail_engine::services::ledger::{CommissionLedger, OutcomeUpdate};
use salesrail_engine::services::qualifier;

async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
}

fn converted(sale: f64) -> OutcomeUpdate {
    OutcomeUpdate {
        outcome: AppointmentOutcome::Converted,
        sale_value: Some(sale),
        notes: None,
        recording_link: None,
    }
}

/// Quiz funnel fixture: a name question and an email question
async fn seed_questions(pool: &SqlitePool) -> (String, String) {
    let name_q = sessions::insert_question(
        pool,
        "What's your name?",
        salesrail_common::types::QuestionRole::Name,
        0,
    )
    .await
    .unwrap();
    let email_q = sessions::insert_question(
        pool,
        "Where should we send your results?",
        salesrail_common::types::QuestionRole::Email,
        1,
    )
    .await
    .unwrap();
    (name_q, email_q)
}

async fn completed_session(
    pool: &SqlitePool,
    code: Option<&str>,
    name: Option<&str>,
    email: Option<&str>,
    completed_at: DateTime<Utc>,
) -> String {
    let (name_q, email_q) = seed_questions(pool).await;
    let session = sessions::insert_session(pool, code, completed_at - Duration::hours(1))
        .await
        .unwrap();
    sessions::upsert_answer(pool, &session, &name_q, name).await.unwrap();
    sessions::upsert_answer(pool, &session, &email_q, email).await.unwrap();
    sessions::mark_completed(pool, &session, completed_at).await.unwrap();
    session
}

// Scenario: a session with a name but an empty email answer is not a lead.
#[tokio::test]
async fn scenario_empty_email_is_not_a_lead() {
    let pool = setup_test_db().await;
    let session = completed_session(&pool, None, Some("Jane"), Some(""), Utc::now()).await;

    let answers = sessions::fetch_role_answers(&pool, &session).await.unwrap();
    let check = qualifier::qualify(SessionStatus::Completed, &answers, 0);
    assert!(!check.is_lead);
}

// Scenario: two completed sessions for the same email dedup to the later one.
#[tokio::test]
async fn scenario_dedup_keeps_latest_completion() {
    let pool = setup_test_db().await;
    affiliates::insert_affiliate(&pool, "Aff", "P1", None, 0.1, "standard")
        .await
        .unwrap();

    let t1 = at(2024, 1, 10);
    let t2 = at(2024, 1, 20);
    completed_session(&pool, Some("P1"), Some("Jane"), Some("jane@x.com"), t1).await;
    let later = completed_session(&pool, Some("P1"), Some("Jane"), Some("jane@x.com"), t2).await;

    let leads = dedup::leads_for_affiliate_code(&pool, "P1", 0).await.unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].session_id, later);
    assert_eq!(leads[0].completed_at, Some(t2));
}

// Scenario: a commission created on 2024-01-01 with a 30 day hold releases
// on 2024-02-01 but not on 2024-01-15.
#[tokio::test]
async fn scenario_hold_window_gates_the_release_sweep() {
    let pool = setup_test_db().await;
    let ledger = CommissionLedger::new(pool.clone());

    affiliates::insert_affiliate(&pool, "Aff", "P1", None, 0.1, "standard")
        .await
        .unwrap();
    let appt = appointments::insert_appointment(
        &pool,
        "Jane",
        "jane@x.com",
        at(2024, 1, 1),
        Some("P1"),
        None,
        at(2024, 1, 1),
    )
    .await
    .unwrap();

    ledger.apply_outcome(&appt, converted(100.0), at(2024, 1, 1)).await.unwrap();

    let conversion = conversions::list_conversions(&pool, None).await.unwrap().remove(0);
    assert_eq!(conversion.hold_until, Some(at(2024, 1, 31)));

    // Mid-hold sweep moves nothing
    let summary = ledger.release_due(at(2024, 1, 15)).await.unwrap();
    assert_eq!(summary.released, 0);
    let row = conversions::fetch_conversion(&pool, &conversion.guid).await.unwrap().unwrap();
    assert_eq!(row.commission_status.as_deref(), Some("held"));

    // Past the hold window it releases
    let summary = ledger.release_due(at(2024, 2, 1)).await.unwrap();
    assert_eq!(summary.released, 1);
    assert_eq!(summary.total_amount, 10.0);
    let row = conversions::fetch_conversion(&pool, &conversion.guid).await.unwrap().unwrap();
    assert_eq!(row.commission_status.as_deref(), Some("available"));
}

// Scenario: a retried outcome update with a different sale value neither
// creates a second conversion nor moves totals a second time.
#[tokio::test]
async fn scenario_retried_outcome_update_counts_once() {
    let pool = setup_test_db().await;
    let ledger = CommissionLedger::new(pool.clone());

    let affiliate = affiliates::insert_affiliate(&pool, "Aff", "P1", None, 0.1, "standard")
        .await
        .unwrap();
    let appt = appointments::insert_appointment(
        &pool,
        "Jane",
        "jane@x.com",
        Utc::now(),
        Some("P1"),
        None,
        Utc::now(),
    )
    .await
    .unwrap();

    let t0 = at(2024, 3, 1);
    ledger.apply_outcome(&appt, converted(100.0), t0).await.unwrap();
    // Retry lands 30 seconds later with a corrected value
    ledger
        .apply_outcome(&appt, converted(150.0), t0 + Duration::seconds(30))
        .await
        .unwrap();

    let rows = conversions::list_conversions(&pool, Some(&affiliate)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sale_value, Some(100.0));
    assert_eq!(rows[0].commission_amount, Some(10.0));

    let (total_sales, total_commission): (i64, f64) =
        sqlx::query_as("SELECT total_sales, total_commission FROM affiliates WHERE guid = ?")
            .bind(&affiliate)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(total_sales, 1);
    assert_eq!(total_commission, 10.0);
}

// Scenario: three closers starting even take one call each.
#[tokio::test]
async fn scenario_round_robin_distributes_evenly() {
    let pool = setup_test_db().await;
    let assigner = RoundRobinAssigner::new(pool.clone());

    let mut closer_ids = Vec::new();
    for name in ["Alice", "Bob", "Cara"] {
        closer_ids.push(closers::insert_closer(&pool, name, None, true).await.unwrap());
    }

    for _ in 0..3 {
        let appt = appointments::insert_appointment(
            &pool,
            "Jane",
            "jane@x.com",
            Utc::now(),
            None,
            None,
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(assigner.assign(&appt).await.unwrap().is_some());
    }

    for id in &closer_ids {
        let calls: i64 = sqlx::query_scalar("SELECT total_calls FROM closers WHERE guid = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(calls, 1);
    }
}

// Property: release and payout move status only. The summed commission
// amount equals the amounts recorded at creation, at every stage.
#[tokio::test]
async fn property_amounts_are_conserved_across_the_lifecycle() {
    let pool = setup_test_db().await;
    let ledger = CommissionLedger::new(pool.clone());

    affiliates::insert_affiliate(&pool, "Aff", "P1", None, 0.25, "standard")
        .await
        .unwrap();

    let mut expected_total = 0.0;
    for sale in [100.0, 40.0, 260.0] {
        let appt = appointments::insert_appointment(
            &pool,
            "Jane",
            "jane@x.com",
            at(2024, 1, 1),
            Some("P1"),
            None,
            at(2024, 1, 1),
        )
        .await
        .unwrap();
        ledger.apply_outcome(&appt, converted(sale), at(2024, 1, 1)).await.unwrap();
        expected_total += sale * 0.25;
    }

    async fn sale_sum(pool: &SqlitePool) -> f64 {
        sqlx::query_scalar(
            "SELECT SUM(commission_amount) FROM affiliate_conversions WHERE conversion_type = 'sale'",
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    assert_eq!(sale_sum(&pool).await, expected_total);

    ledger.release_due(at(2024, 3, 1)).await.unwrap();
    assert_eq!(sale_sum(&pool).await, expected_total);

    for conversion in conversions::list_conversions(&pool, None).await.unwrap() {
        ledger.mark_paid(&conversion.guid).await.unwrap();
    }
    assert_eq!(sale_sum(&pool).await, expected_total);

    // The cached cumulative total saw exactly one increment per conversion
    let total_commission: f64 =
        sqlx::query_scalar("SELECT total_commission FROM affiliates WHERE referral_code = 'P1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(total_commission, expected_total);
}
