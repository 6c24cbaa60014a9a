//! Domain enums shared across SalesRail services
//!
//! Every enum here is persisted as TEXT, so each carries `as_str` /
//! `FromStr` pairs alongside the serde derives. The commission status
//! transition table lives here so no caller can invent its own rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Quiz session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(Error::InvalidInput(format!(
                "unknown session status: {}",
                other
            ))),
        }
    }
}

/// Semantic role of a quiz question, assigned at authoring time.
///
/// The lead qualifier reads this typed field; it never re-derives the role
/// from the question prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionRole {
    Name,
    Email,
    Other,
}

impl QuestionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionRole::Name => "name",
            QuestionRole::Email => "email",
            QuestionRole::Other => "other",
        }
    }
}

impl fmt::Display for QuestionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(QuestionRole::Name),
            "email" => Ok(QuestionRole::Email),
            "other" => Ok(QuestionRole::Other),
            other => Err(Error::InvalidInput(format!(
                "unknown question role: {}",
                other
            ))),
        }
    }
}

/// Appointment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(Error::InvalidInput(format!(
                "unknown appointment status: {}",
                other
            ))),
        }
    }
}

/// Recorded outcome of a closed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentOutcome {
    Converted,
    NotInterested,
    NeedsFollowUp,
    WrongNumber,
    NoAnswer,
    CallbackRequested,
    Rescheduled,
}

impl AppointmentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentOutcome::Converted => "converted",
            AppointmentOutcome::NotInterested => "not_interested",
            AppointmentOutcome::NeedsFollowUp => "needs_follow_up",
            AppointmentOutcome::WrongNumber => "wrong_number",
            AppointmentOutcome::NoAnswer => "no_answer",
            AppointmentOutcome::CallbackRequested => "callback_requested",
            AppointmentOutcome::Rescheduled => "rescheduled",
        }
    }

    /// True when this outcome records a closed sale
    pub fn is_conversion(&self) -> bool {
        matches!(self, AppointmentOutcome::Converted)
    }
}

impl fmt::Display for AppointmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "converted" => Ok(AppointmentOutcome::Converted),
            "not_interested" => Ok(AppointmentOutcome::NotInterested),
            "needs_follow_up" => Ok(AppointmentOutcome::NeedsFollowUp),
            "wrong_number" => Ok(AppointmentOutcome::WrongNumber),
            "no_answer" => Ok(AppointmentOutcome::NoAnswer),
            "callback_requested" => Ok(AppointmentOutcome::CallbackRequested),
            "rescheduled" => Ok(AppointmentOutcome::Rescheduled),
            other => Err(Error::InvalidInput(format!(
                "unknown appointment outcome: {}",
                other
            ))),
        }
    }
}

/// Commission lifecycle status.
///
/// Moves strictly held -> available -> paid. The only shortcut is the
/// forced held -> available override, which skips the hold window but not
/// the held precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Held,
    Available,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Held => "held",
            CommissionStatus::Available => "available",
            CommissionStatus::Paid => "paid",
        }
    }

    /// Transition table for commission statuses.
    ///
    /// Available and paid commissions are never re-held.
    pub fn can_transition(from: CommissionStatus, to: CommissionStatus) -> bool {
        matches!(
            (from, to),
            (CommissionStatus::Held, CommissionStatus::Available)
                | (CommissionStatus::Available, CommissionStatus::Paid)
        )
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "held" => Ok(CommissionStatus::Held),
            "available" => Ok(CommissionStatus::Available),
            "paid" => Ok(CommissionStatus::Paid),
            other => Err(Error::InvalidInput(format!(
                "unknown commission status: {}",
                other
            ))),
        }
    }
}

/// Affiliate conversion event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionType {
    Booking,
    Sale,
}

impl ConversionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionType::Booking => "booking",
            ConversionType::Sale => "sale",
        }
    }
}

impl fmt::Display for ConversionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking" => Ok(ConversionType::Booking),
            "sale" => Ok(ConversionType::Sale),
            other => Err(Error::InvalidInput(format!(
                "unknown conversion type: {}",
                other
            ))),
        }
    }
}

/// Normalize an email for identity comparison (lowercased, trimmed)
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
