//! Commission ledger
//!
//! Owns the held/available/paid lifecycle of affiliate commissions and the
//! closer revenue counters. Conversion creation is exactly-once per
//! appointment: the previous-outcome check stops logical re-creation and
//! the (appointment_id, conversion_type) unique key stops concurrent
//! retries at the database.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, warn};
use uuid::Uuid;

use salesrail_common::db::models::Affiliate;
use salesrail_common::db::settings;
use salesrail_common::types::{AppointmentOutcome, CommissionStatus};
use salesrail_common::{Error, Result};

use crate::db::{appointments, conversions};
use crate::services::{attribution, reconcile};

/// Commission ledger over the shared store
pub struct CommissionLedger {
    db: Pool<Sqlite>,
}

/// Parsed outcome-update request
#[derive(Debug, Clone)]
pub struct OutcomeUpdate {
    pub outcome: AppointmentOutcome,
    pub sale_value: Option<f64>,
    pub notes: Option<String>,
    pub recording_link: Option<String>,
}

/// What an outcome update did to the ledger
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeApplied {
    pub appointment_id: String,
    pub outcome: AppointmentOutcome,
    pub conversion_created: bool,
    pub commission_amount: Option<f64>,
}

/// Result of a release sweep
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseSummary {
    pub released: i64,
    pub total_amount: f64,
}

impl CommissionLedger {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Apply an appointment outcome and adjust the ledger.
    ///
    /// The appointment row update, the closer counter deltas, and any
    /// conversion creation commit together or not at all.
    pub async fn apply_outcome(
        &self,
        appointment_id: &str,
        update: OutcomeUpdate,
        now: DateTime<Utc>,
    ) -> Result<OutcomeApplied> {
        if update.sale_value.is_some_and(|v| v < 0.0) {
            return Err(Error::InvalidInput("sale_value must not be negative".to_string()));
        }

        let appointment = appointments::fetch_appointment(&self.db, appointment_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("appointment {}", appointment_id)))?;

        let prev_outcome = appointment
            .outcome
            .as_deref()
            .and_then(|o| o.parse::<AppointmentOutcome>().ok());
        let prev_sale = appointment.sale_value.unwrap_or(0.0);
        let new_sale = update.sale_value.unwrap_or(0.0);

        let terminal = settings::get_terminal_outcomes(&self.db).await?;
        let hold_days = settings::get_commission_hold_days(&self.db).await?;

        // Resolve attribution outside the write transaction; an unresolved
        // code is organic traffic, not a failure
        let affiliate = match appointment.affiliate_code.as_deref() {
            Some(code) => attribution::resolve_affiliate(&self.db, code).await?,
            None => None,
        };

        let mut tx = self.db.begin().await?;

        let status = if terminal.contains(&update.outcome) {
            "completed"
        } else {
            appointment.status.as_str()
        };

        sqlx::query(
            "UPDATE appointments \
             SET outcome = ?, sale_value = ?, notes = ?, recording_link = ?, status = ?, updated_at = ? \
             WHERE guid = ?",
        )
        .bind(update.outcome.as_str())
        .bind(update.sale_value)
        .bind(&update.notes)
        .bind(&update.recording_link)
        .bind(status)
        .bind(now)
        .bind(appointment_id)
        .execute(&mut *tx)
        .await?;

        // Closer counters move by the delta between the previous and new
        // (outcome, sale_value) pair
        if let Some(closer_id) = appointment.closer_id.as_deref() {
            let prev_conv = prev_outcome.is_some_and(|o| o.is_conversion());
            let new_conv = update.outcome.is_conversion();

            let (conv_delta, revenue_delta) = match (prev_conv, new_conv) {
                (false, true) => (1i64, new_sale),
                (true, false) => (-1i64, -prev_sale),
                (true, true) => (0i64, new_sale - prev_sale),
                (false, false) => (0i64, 0.0),
            };

            if conv_delta != 0 || revenue_delta != 0.0 {
                sqlx::query(
                    "UPDATE closers \
                     SET total_conversions = total_conversions + ?, total_revenue = total_revenue + ?, \
                         updated_at = ? \
                     WHERE guid = ?",
                )
                .bind(conv_delta)
                .bind(revenue_delta)
                .bind(now)
                .bind(closer_id)
                .execute(&mut *tx)
                .await?;
            }

            // The rate is never accumulated; recompute it from the log and
            // resync the cached counters if they have drifted
            let scanned = reconcile::scan_closer_stats(&mut *tx, closer_id).await?;
            let cached: (i64, i64, f64) = sqlx::query_as(
                "SELECT total_calls, total_conversions, total_revenue FROM closers WHERE guid = ?",
            )
            .bind(closer_id)
            .fetch_one(&mut *tx)
            .await?;

            if cached.0 != scanned.total_calls
                || cached.1 != scanned.total_conversions
                || (cached.2 - scanned.total_revenue).abs() > f64::EPSILON
            {
                warn!(closer_id, "Closer counters drifted from appointment log, resynchronizing");
            }

            sqlx::query(
                "UPDATE closers \
                 SET total_calls = ?, total_conversions = ?, total_revenue = ?, conversion_rate = ?, \
                     updated_at = ? \
                 WHERE guid = ?",
            )
            .bind(scanned.total_calls)
            .bind(scanned.total_conversions)
            .bind(scanned.total_revenue)
            .bind(scanned.conversion_rate)
            .bind(now)
            .bind(closer_id)
            .execute(&mut *tx)
            .await?;
        }

        // Conversion creation only on the first transition into converted.
        // Re-setting an already-converted outcome updates the appointment
        // row alone.
        let mut conversion_created = false;
        let mut commission_amount = None;

        let first_conversion =
            update.outcome.is_conversion() && !prev_outcome.is_some_and(|o| o.is_conversion());

        if first_conversion && new_sale > 0.0 {
            match &affiliate {
                Some(affiliate) => {
                    let amount = new_sale * affiliate.commission_rate;
                    let hold_until = now + Duration::days(hold_days);

                    let inserted = sqlx::query(
                        "INSERT OR IGNORE INTO affiliate_conversions \
                         (guid, affiliate_id, appointment_id, referral_code, conversion_type, \
                          sale_value, commission_amount, commission_status, hold_until, created_at) \
                         VALUES (?, ?, ?, ?, 'sale', ?, ?, 'held', ?, ?)",
                    )
                    .bind(Uuid::new_v4().to_string())
                    .bind(&affiliate.guid)
                    .bind(appointment_id)
                    .bind(&affiliate.referral_code)
                    .bind(new_sale)
                    .bind(amount)
                    .bind(hold_until)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;

                    if inserted.rows_affected() == 1 {
                        // total_commission moves exactly once, here; release
                        // and payout never touch it
                        sqlx::query(
                            "UPDATE affiliates \
                             SET total_commission = total_commission + ?, total_sales = total_sales + 1, \
                                 updated_at = ? \
                             WHERE guid = ?",
                        )
                        .bind(amount)
                        .bind(now)
                        .bind(&affiliate.guid)
                        .execute(&mut *tx)
                        .await?;

                        conversion_created = true;
                        commission_amount = Some(amount);

                        info!(
                            appointment_id,
                            affiliate_id = %affiliate.guid,
                            sale_value = new_sale,
                            commission = amount,
                            hold_until = %hold_until,
                            "Created held sale commission"
                        );
                    } else {
                        info!(
                            appointment_id,
                            affiliate_id = %affiliate.guid,
                            "Duplicate sale conversion suppressed"
                        );
                    }
                }
                None => {
                    debug!(appointment_id, "Converted sale has no resolvable affiliate, no commission");
                }
            }
        }

        tx.commit().await?;

        Ok(OutcomeApplied {
            appointment_id: appointment_id.to_string(),
            outcome: update.outcome,
            conversion_created,
            commission_amount,
        })
    }

    /// Record an attributed booking conversion and bump the affiliate's
    /// booking counter. Idempotent per appointment.
    pub async fn record_booking(
        &self,
        affiliate: &Affiliate,
        appointment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO affiliate_conversions \
             (guid, affiliate_id, appointment_id, referral_code, conversion_type, created_at) \
             VALUES (?, ?, ?, ?, 'booking', ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&affiliate.guid)
        .bind(appointment_id)
        .bind(&affiliate.referral_code)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE affiliates SET total_bookings = total_bookings + 1, updated_at = ? WHERE guid = ?",
        )
        .bind(now)
        .bind(&affiliate.guid)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(appointment_id, affiliate_id = %affiliate.guid, "Recorded attributed booking");

        Ok(true)
    }

    /// Release every held commission whose hold window has elapsed.
    ///
    /// Idempotent by construction: only rows still held move, so re-running
    /// or overlapping sweeps are no-ops for already-released rows.
    pub async fn release_due(&self, now: DateTime<Utc>) -> Result<ReleaseSummary> {
        let mut tx = self.db.begin().await?;

        let (released, total_amount): (i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*), SUM(commission_amount) FROM affiliate_conversions \
             WHERE conversion_type = 'sale' AND commission_status = 'held' AND hold_until <= ?",
        )
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if released > 0 {
            sqlx::query(
                "UPDATE affiliate_conversions SET commission_status = 'available' \
                 WHERE conversion_type = 'sale' AND commission_status = 'held' AND hold_until <= ?",
            )
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let total_amount = total_amount.unwrap_or(0.0);
        info!(released, total_amount, "Commission release sweep finished");

        Ok(ReleaseSummary { released, total_amount })
    }

    /// Force-release one held commission regardless of its hold window.
    ///
    /// The held precondition still applies; anything else is rejected
    /// without mutation.
    pub async fn force_release(&self, conversion_id: &str) -> Result<()> {
        self.transition(conversion_id, CommissionStatus::Available, "commission is not in held status")
            .await?;

        info!(conversion_id, "Commission force-released");
        Ok(())
    }

    /// Mark one available commission as paid out
    pub async fn mark_paid(&self, conversion_id: &str) -> Result<()> {
        self.transition(conversion_id, CommissionStatus::Paid, "commission is not in available status")
            .await?;

        info!(conversion_id, "Commission marked paid");
        Ok(())
    }

    /// Advance a conversion to `to` if the transition table allows it from
    /// the current status. Amounts never change here, only status.
    async fn transition(
        &self,
        conversion_id: &str,
        to: CommissionStatus,
        reject_message: &str,
    ) -> Result<()> {
        let conversion = conversions::fetch_conversion(&self.db, conversion_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversion {}", conversion_id)))?;

        let current = conversion
            .commission_status
            .as_deref()
            .and_then(|s| s.parse::<CommissionStatus>().ok());

        let Some(from) = current else {
            // Booking conversions carry no commission lifecycle
            return Err(Error::Conflict(reject_message.to_string()));
        };
        if !CommissionStatus::can_transition(from, to) {
            return Err(Error::Conflict(reject_message.to_string()));
        }
        let updated = sqlx::query(
            "UPDATE affiliate_conversions SET commission_status = ? \
             WHERE guid = ? AND commission_status = ?",
        )
        .bind(to.as_str())
        .bind(conversion_id)
        .bind(from.as_str())
        .execute(&self.db)
        .await?;

        // Lost a race with a concurrent transition
        if updated.rows_affected() == 0 {
            return Err(Error::Conflict(reject_message.to_string()));
        }

        Ok(())
    }
}
