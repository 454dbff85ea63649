//! Decision rules of the submission lifecycle.
//!
//! Everything here is pure: handlers load the assignment and the current
//! submission row, ask this module what should happen, and only then write.
//! A rejected decision therefore never touches storage.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{Assignment, Submission};
use crate::db::types::SubmissionStatus;

pub(crate) const MIN_GRADE: f64 = 0.0;
pub(crate) const MAX_GRADE: f64 = 100.0;
pub(crate) const REJECTION_NOTICE: &str = "Submission rejected by instructor";

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum WorkflowError {
    #[error("Grade must be a number")]
    GradeNotNumeric,
    #[error("Grade must be between 0 and 100")]
    GradeOutOfRange,
    #[error("Submission must contain text or at least one file")]
    EmptySubmission,
    #[error("Assignment is closed")]
    AssignmentClosed,
    #[error("The deadline for this assignment has passed")]
    DeadlinePassed,
    #[error("Resubmission is not allowed for this assignment")]
    ResubmissionNotAllowed,
    #[error("Only students of this subgroup can submit")]
    NotAStudentMember,
    #[error("No submission to grade")]
    NothingToGrade,
    #[error("Submission was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict { expected: i64, actual: i64 },
}

/// Status an instructor may set when grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ReviewStatus {
    Approved,
    Graded,
    Rejected,
}

impl From<ReviewStatus> for SubmissionStatus {
    fn from(value: ReviewStatus) -> Self {
        match value {
            ReviewStatus::Approved => Self::Approved,
            ReviewStatus::Graded => Self::Graded,
            ReviewStatus::Rejected => Self::Rejected,
        }
    }
}

/// The parts of an assignment the workflow reads.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AssignmentRules {
    pub(crate) deadline: PrimitiveDateTime,
    pub(crate) allow_resubmission: bool,
    pub(crate) allow_late_submission: bool,
    pub(crate) closed: bool,
}

impl From<&Assignment> for AssignmentRules {
    fn from(assignment: &Assignment) -> Self {
        Self {
            deadline: assignment.deadline,
            allow_resubmission: assignment.allow_resubmission,
            allow_late_submission: assignment.allow_late_submission,
            closed: assignment.closed_at.is_some(),
        }
    }
}

/// Snapshot of a stored submission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CurrentSubmission {
    pub(crate) status: SubmissionStatus,
    pub(crate) version: i64,
}

impl From<&Submission> for CurrentSubmission {
    fn from(submission: &Submission) -> Self {
        Self { status: submission.status, version: submission.version }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubmitDecision {
    pub(crate) late: bool,
    /// Version the upsert must still find, `None` when no row may exist yet.
    pub(crate) expected_version: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GradeDecision {
    pub(crate) status: SubmissionStatus,
    pub(crate) grade: f64,
    pub(crate) expected_version: i64,
}

impl GradeDecision {
    pub(crate) fn is_approval(&self) -> bool {
        self.status == SubmissionStatus::Approved
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RejectDecision {
    pub(crate) feedback: String,
    pub(crate) expected_version: i64,
}

/// Accepts a JSON number or a numeric string; anything else is not a grade.
pub(crate) fn parse_grade(raw: &serde_json::Value) -> Result<f64, WorkflowError> {
    let value = match raw {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or(WorkflowError::GradeNotNumeric)?;

    check_grade(value)
}

pub(crate) fn check_grade(value: f64) -> Result<f64, WorkflowError> {
    if !value.is_finite() {
        return Err(WorkflowError::GradeNotNumeric);
    }
    if !(MIN_GRADE..=MAX_GRADE).contains(&value) {
        return Err(WorkflowError::GradeOutOfRange);
    }
    Ok(value)
}

pub(crate) fn decide_submit(
    rules: AssignmentRules,
    current: Option<CurrentSubmission>,
    has_content: bool,
    now: PrimitiveDateTime,
) -> Result<SubmitDecision, WorkflowError> {
    // Checked before `closed`: the deadline sweep closes these too.
    let late = now > rules.deadline;
    if late && !rules.allow_late_submission {
        return Err(WorkflowError::DeadlinePassed);
    }

    if rules.closed {
        return Err(WorkflowError::AssignmentClosed);
    }

    if current.is_some() && !rules.allow_resubmission {
        return Err(WorkflowError::ResubmissionNotAllowed);
    }

    if !has_content {
        return Err(WorkflowError::EmptySubmission);
    }

    Ok(SubmitDecision { late, expected_version: current.map(|row| row.version) })
}

pub(crate) fn decide_grade(
    current: Option<CurrentSubmission>,
    grade: f64,
    status: ReviewStatus,
    expected_version: Option<i64>,
) -> Result<GradeDecision, WorkflowError> {
    let grade = check_grade(grade)?;
    let current = current.ok_or(WorkflowError::NothingToGrade)?;
    check_version(current, expected_version)?;

    Ok(GradeDecision { status: status.into(), grade, expected_version: current.version })
}

pub(crate) fn decide_reject(
    current: Option<CurrentSubmission>,
    reason: Option<&str>,
    expected_version: Option<i64>,
) -> Result<RejectDecision, WorkflowError> {
    let current = current.ok_or(WorkflowError::NothingToGrade)?;
    check_version(current, expected_version)?;

    Ok(RejectDecision { feedback: rejection_feedback(reason), expected_version: current.version })
}

pub(crate) fn rejection_feedback(reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|reason| !reason.is_empty()) {
        Some(reason) => format!("{REJECTION_NOTICE}: {reason}"),
        None => REJECTION_NOTICE.to_string(),
    }
}

fn check_version(current: CurrentSubmission, expected: Option<i64>) -> Result<(), WorkflowError> {
    match expected {
        Some(expected) if expected != current.version => {
            Err(WorkflowError::VersionConflict { expected, actual: current.version })
        }
        _ => Ok(()),
    }
}
