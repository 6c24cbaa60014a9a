//! Lead qualification
//!
//! Decides whether a quiz session represents a contactable lead: the
//! session must be completed and carry non-empty answers to the name-role
//! and email-role questions. Pure and side-effect free; malformed input is
//! never an error, only a non-lead.

use serde::Serialize;

use salesrail_common::types::{QuestionRole, SessionStatus};

/// One answer paired with its question's semantic role.
///
/// Roles are assigned at quiz-authoring time and read back as a typed
/// field; nothing here inspects prompt text.
#[derive(Debug, Clone)]
pub struct RoleAnswer {
    pub role: QuestionRole,
    pub value: Option<String>,
}

/// Result of qualifying one session
#[derive(Debug, Clone, Serialize)]
pub struct LeadCheck {
    pub is_lead: bool,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl LeadCheck {
    fn not_a_lead() -> Self {
        Self { is_lead: false, name: None, email: None }
    }
}

/// Qualify a session from its status and role-tagged answers.
///
/// `min_answers` is the configured qualification threshold: the number of
/// answered questions a session needs before the name/email check runs.
pub fn qualify(status: SessionStatus, answers: &[RoleAnswer], min_answers: usize) -> LeadCheck {
    if status != SessionStatus::Completed {
        return LeadCheck::not_a_lead();
    }

    let answered = answers
        .iter()
        .filter(|a| a.value.as_deref().is_some_and(|v| !v.trim().is_empty()))
        .count();
    if answered < min_answers {
        return LeadCheck::not_a_lead();
    }

    let name = role_value(answers, QuestionRole::Name);
    let email = role_value(answers, QuestionRole::Email);

    match (name, email) {
        (Some(name), Some(email)) => LeadCheck { is_lead: true, name: Some(name), email: Some(email) },
        _ => LeadCheck::not_a_lead(),
    }
}

/// First non-empty trimmed answer for the given role
fn role_value(answers: &[RoleAnswer], role: QuestionRole) -> Option<String> {
    answers
        .iter()
        .filter(|a| a.role == role)
        .filter_map(|a| a.value.as_deref())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(role: QuestionRole, value: Option<&str>) -> RoleAnswer {
        RoleAnswer { role, value: value.map(str::to_string) }
    }

    #[test]
    fn test_completed_with_name_and_email_is_lead() {
        let answers = vec![
            answer(QuestionRole::Name, Some("Jane")),
            answer(QuestionRole::Email, Some("jane@x.com")),
            answer(QuestionRole::Other, Some("whatever")),
        ];

        let check = qualify(SessionStatus::Completed, &answers, 0);
        assert!(check.is_lead);
        assert_eq!(check.name.as_deref(), Some("Jane"));
        assert_eq!(check.email.as_deref(), Some("jane@x.com"));
    }

    #[test]
    fn test_in_progress_session_is_not_a_lead() {
        let answers = vec![
            answer(QuestionRole::Name, Some("Jane")),
            answer(QuestionRole::Email, Some("jane@x.com")),
        ];

        assert!(!qualify(SessionStatus::InProgress, &answers, 0).is_lead);
    }

    #[test]
    fn test_empty_email_is_not_a_lead() {
        // Name present, email empty string
        let answers = vec![
            answer(QuestionRole::Name, Some("Jane")),
            answer(QuestionRole::Email, Some("")),
        ];

        assert!(!qualify(SessionStatus::Completed, &answers, 0).is_lead);
    }

    #[test]
    fn test_whitespace_only_answers_are_empty() {
        let answers = vec![
            answer(QuestionRole::Name, Some("   ")),
            answer(QuestionRole::Email, Some("jane@x.com")),
        ];

        assert!(!qualify(SessionStatus::Completed, &answers, 0).is_lead);
    }

    #[test]
    fn test_missing_and_null_answers_are_empty() {
        let missing = vec![answer(QuestionRole::Email, Some("jane@x.com"))];
        assert!(!qualify(SessionStatus::Completed, &missing, 0).is_lead);

        let null = vec![
            answer(QuestionRole::Name, None),
            answer(QuestionRole::Email, Some("jane@x.com")),
        ];
        assert!(!qualify(SessionStatus::Completed, &null, 0).is_lead);

        assert!(!qualify(SessionStatus::Completed, &[], 0).is_lead);
    }

    #[test]
    fn test_answer_values_are_trimmed() {
        let answers = vec![
            answer(QuestionRole::Name, Some("  Jane  ")),
            answer(QuestionRole::Email, Some(" jane@x.com ")),
        ];

        let check = qualify(SessionStatus::Completed, &answers, 0);
        assert!(check.is_lead);
        assert_eq!(check.name.as_deref(), Some("Jane"));
        assert_eq!(check.email.as_deref(), Some("jane@x.com"));
    }

    #[test]
    fn test_qualification_threshold_applies() {
        let answers = vec![
            answer(QuestionRole::Name, Some("Jane")),
            answer(QuestionRole::Email, Some("jane@x.com")),
        ];

        assert!(qualify(SessionStatus::Completed, &answers, 2).is_lead);
        assert!(!qualify(SessionStatus::Completed, &answers, 3).is_lead);
    }
}
