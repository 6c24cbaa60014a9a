//! Database row models
//!
//! Ids are TEXT UUIDs and enum-valued columns are TEXT; the typed enums in
//! `crate::types` are parsed at the service layer where the values matter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizQuestion {
    pub guid: String,
    pub prompt: String,
    pub role: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizSession {
    pub guid: String,
    pub status: String,
    pub affiliate_code: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Affiliate {
    pub guid: String,
    pub name: String,
    pub referral_code: String,
    pub custom_link: Option<String>,
    pub commission_rate: f64,
    pub tier: String,
    pub total_clicks: i64,
    pub total_leads: i64,
    pub total_bookings: i64,
    pub total_sales: i64,
    pub total_commission: f64,
    pub is_approved: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Closer {
    pub guid: String,
    pub name: String,
    pub email: Option<String>,
    pub total_calls: i64,
    pub total_conversions: i64,
    pub total_revenue: f64,
    pub conversion_rate: f64,
    pub is_active: bool,
    pub is_approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub guid: String,
    pub customer_name: String,
    pub customer_email: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub outcome: Option<String>,
    pub sale_value: Option<f64>,
    pub notes: Option<String>,
    pub recording_link: Option<String>,
    pub affiliate_code: Option<String>,
    pub closer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AffiliateConversion {
    pub guid: String,
    pub affiliate_id: String,
    pub appointment_id: Option<String>,
    pub referral_code: String,
    pub conversion_type: String,
    pub sale_value: Option<f64>,
    pub commission_amount: Option<f64>,
    pub commission_status: Option<String>,
    pub hold_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
