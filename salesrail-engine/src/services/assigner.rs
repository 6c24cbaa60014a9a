//! Round-robin appointment assignment
//!
//! Assigns unclaimed appointments to the least-loaded active and approved
//! closer. The pick, the assignment, and the counter increment run in one
//! transaction so concurrent assignments cannot both observe the same
//! minimum and pile onto one closer.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use salesrail_common::Result;

use crate::db::appointments;

/// Round-robin assigner over the closer pool
pub struct RoundRobinAssigner {
    db: Pool<Sqlite>,
}

/// Outcome of an assign-pending sweep
#[derive(Debug, Clone, Serialize)]
pub struct AssignSweepSummary {
    pub assigned: i64,
    pub still_unassigned: i64,
}

impl RoundRobinAssigner {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Assign one appointment to the least-loaded eligible closer.
    ///
    /// Returns the chosen closer id, or None when no closer is eligible.
    /// The no-closer case is a reportable condition, not an error; the
    /// appointment stays unassigned and a later sweep retries it.
    pub async fn assign(&self, appointment_id: &str) -> Result<Option<String>> {
        let mut tx = self.db.begin().await?;

        // Least-loaded first, ties broken by id so the order is stable
        let picked: Option<(String,)> = sqlx::query_as(
            "SELECT guid FROM closers \
             WHERE is_active = 1 AND is_approved = 1 \
             ORDER BY total_calls ASC, guid ASC \
             LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some((closer_id,)) = picked else {
            tx.rollback().await?;
            warn!(appointment_id, "No eligible closer, leaving appointment unassigned");
            return Ok(None);
        };

        let now = Utc::now();

        sqlx::query(
            "UPDATE appointments \
             SET closer_id = ?, status = 'confirmed', updated_at = ? \
             WHERE guid = ?",
        )
        .bind(&closer_id)
        .bind(now)
        .bind(appointment_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE closers SET total_calls = total_calls + 1, updated_at = ? WHERE guid = ?")
            .bind(now)
            .bind(&closer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(appointment_id, closer_id = %closer_id, "Assigned appointment via round-robin");

        Ok(Some(closer_id))
    }

    /// Retry assignment for every pending appointment without a closer.
    ///
    /// Used by the periodic reconciliation pass after closers come online
    /// or get approved.
    pub async fn assign_pending(&self) -> Result<AssignSweepSummary> {
        let pending = appointments::list_unassigned(&self.db).await?;

        let mut assigned = 0;
        let mut still_unassigned = 0;
        for appointment in pending {
            match self.assign(&appointment.guid).await? {
                Some(_) => assigned += 1,
                None => still_unassigned += 1,
            }
        }

        if still_unassigned > 0 {
            warn!(still_unassigned, "Assign sweep left appointments unassigned");
        }

        Ok(AssignSweepSummary { assigned, still_unassigned })
    }
}
