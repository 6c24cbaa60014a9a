//! Lead deduplication
//!
//! Collapses repeat quiz sessions into one canonical lead per normalized
//! email. This is the single "how many leads" definition; every count in
//! the system goes through it so no two numbers can disagree.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use salesrail_common::types::normalize_email;
use salesrail_common::Result;

use crate::db::sessions;
use crate::services::qualifier;

/// One qualified lead, pre-dedup
#[derive(Debug, Clone)]
pub struct LeadRecord {
    pub session_id: String,
    pub email: String,
    pub name: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
}

impl LeadRecord {
    /// Timestamp used for recency comparison
    fn effective_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.started_at)
    }
}

/// Collapse leads to one entry per normalized email, keeping the most
/// recently completed session. Exact timestamp ties resolve to the
/// smallest session id so the result is deterministic.
pub fn dedupe(leads: Vec<LeadRecord>) -> Vec<LeadRecord> {
    let mut by_email: HashMap<String, LeadRecord> = HashMap::new();

    for lead in leads {
        let key = normalize_email(&lead.email);
        match by_email.get(&key) {
            Some(existing) => {
                let newer = lead.effective_at() > existing.effective_at()
                    || (lead.effective_at() == existing.effective_at()
                        && lead.session_id < existing.session_id);
                if newer {
                    by_email.insert(key, lead);
                }
            }
            None => {
                by_email.insert(key, lead);
            }
        }
    }

    let mut deduped: Vec<LeadRecord> = by_email.into_values().collect();
    deduped.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    deduped
}

/// Canonical deduped lead set for one affiliate's completed sessions
pub async fn leads_for_affiliate_code(
    db: &Pool<Sqlite>,
    affiliate_code: &str,
    min_answers: usize,
) -> Result<Vec<LeadRecord>> {
    let completed = sessions::fetch_completed_for_code(db, affiliate_code).await?;

    let mut leads = Vec::new();
    for session in completed {
        let answers = sessions::fetch_role_answers(db, &session.guid).await?;
        let status = match session.status.parse() {
            Ok(status) => status,
            // Schema CHECK makes this unreachable; skip rather than fail
            Err(_) => continue,
        };

        let check = qualifier::qualify(status, &answers, min_answers);
        if check.is_lead {
            leads.push(LeadRecord {
                session_id: session.guid,
                email: check.email.unwrap_or_default(),
                name: check.name.unwrap_or_default(),
                completed_at: session.completed_at,
                started_at: session.started_at,
            });
        }
    }

    Ok(dedupe(leads))
}
