//! Affiliate attribution
//!
//! Resolves raw referral codes to affiliates and classifies appointments
//! as affiliate-sourced bookings or affiliate sales.
//!
//! Booking classification is stricter than sale classification on purpose:
//! a booked call only counts when the customer email shows up among the
//! affiliate's own qualifying quiz leads, which filters out manually
//! tagged appointments. Sales only need the code tag plus a converted
//! outcome, because direct bookings that never touch the quiz still close.
//! Booking counts and sale counts can therefore disagree; that is expected,
//! not a bug.

use std::collections::HashSet;

use sqlx::{Pool, Sqlite};
use tracing::debug;

use salesrail_common::db::models::{Affiliate, Appointment};
use salesrail_common::types::{normalize_email, AppointmentOutcome};
use salesrail_common::Result;

use crate::db::affiliates;
use crate::services::dedup;

/// Resolve an affiliate from a raw code string.
///
/// Tries the exact referral code first, then the custom tracking link with
/// leading-slash normalization ('code' and '/code' both match). Unresolved
/// codes mean organic traffic and return None, never an error.
pub async fn resolve_affiliate(db: &Pool<Sqlite>, code: &str) -> Result<Option<Affiliate>> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }

    if let Some(affiliate) = affiliates::fetch_by_referral_code(db, code).await? {
        return Ok(Some(affiliate));
    }

    let link = if code.starts_with('/') {
        code.to_string()
    } else {
        format!("/{}", code)
    };

    if let Some(affiliate) = affiliates::fetch_by_custom_link(db, &link).await? {
        return Ok(Some(affiliate));
    }

    debug!(code, "Affiliate code did not resolve, treating as organic");
    Ok(None)
}

/// Emails of the affiliate's deduped qualifying leads, normalized
pub async fn lead_emails(
    db: &Pool<Sqlite>,
    affiliate: &Affiliate,
    min_answers: usize,
) -> Result<HashSet<String>> {
    let leads = dedup::leads_for_affiliate_code(db, &affiliate.referral_code, min_answers).await?;
    Ok(leads.iter().map(|l| normalize_email(&l.email)).collect())
}

/// Strict booking classification: the appointment's customer email must
/// belong to one of the affiliate's own qualifying quiz leads.
pub fn is_affiliate_booking(appointment: &Appointment, lead_emails: &HashSet<String>) -> bool {
    lead_emails.contains(&normalize_email(&appointment.customer_email))
}

/// Loose sale classification: code tag matches and the call converted.
pub fn is_affiliate_sale(affiliate: &Affiliate, appointment: &Appointment) -> bool {
    let tagged = appointment.affiliate_code.as_deref() == Some(affiliate.referral_code.as_str());
    let converted = appointment
        .outcome
        .as_deref()
        .and_then(|o| o.parse::<AppointmentOutcome>().ok())
        .is_some_and(|o| o.is_conversion());

    tagged && converted
}
