use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Student,
    Instructor,
    Admin,
}

impl UserRole {
    pub(crate) fn is_staff(self) -> bool {
        matches!(self, Self::Instructor | Self::Admin)
    }
}

/// Role of a user inside one subgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "memberrole", rename_all = "lowercase")]
pub(crate) enum MemberRole {
    Student,
    Instructor,
}

/// Persisted submission status. `not_submitted` only exists on the API side,
/// see [`SubmissionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "submissionstatus", rename_all = "lowercase")]
pub(crate) enum SubmissionStatus {
    Submitted,
    Approved,
    Graded,
    Rejected,
}

impl SubmissionStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Graded => "graded",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SubmissionState {
    NotSubmitted,
    Submitted,
    Approved,
    Graded,
    Rejected,
}

impl From<Option<SubmissionStatus>> for SubmissionState {
    fn from(value: Option<SubmissionStatus>) -> Self {
        match value {
            None => Self::NotSubmitted,
            Some(SubmissionStatus::Submitted) => Self::Submitted,
            Some(SubmissionStatus::Approved) => Self::Approved,
            Some(SubmissionStatus::Graded) => Self::Graded,
            Some(SubmissionStatus::Rejected) => Self::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_is_not_submitted() {
        assert_eq!(SubmissionState::from(None), SubmissionState::NotSubmitted);
        assert_eq!(
            SubmissionState::from(Some(SubmissionStatus::Rejected)),
            SubmissionState::Rejected
        );
        assert_eq!(
            serde_json::to_value(SubmissionState::NotSubmitted).unwrap(),
            serde_json::json!("not_submitted")
        );
    }
}
