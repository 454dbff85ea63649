use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{Submission, SubmissionFile};
use crate::db::types::{SubmissionState, SubmissionStatus};
use crate::repositories::submissions::RosterRow;
use crate::services::submission_workflow::ReviewStatus;

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionFileResponse {
    pub(crate) id: String,
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) sha256: String,
}

impl SubmissionFileResponse {
    pub(crate) fn from_db(file: SubmissionFile) -> Self {
        Self {
            id: file.id,
            filename: file.filename,
            mime_type: file.mime_type,
            file_size: file.file_size,
            sha256: file.sha256,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SubmissionState,
    pub(crate) text: Option<String>,
    pub(crate) grade: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) late: bool,
    pub(crate) submitted_at: String,
    pub(crate) approved_at: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) version: i64,
    pub(crate) files: Vec<SubmissionFileResponse>,
}

impl SubmissionResponse {
    pub(crate) fn from_db(submission: Submission, files: Vec<SubmissionFile>) -> Self {
        Self {
            id: submission.id,
            assignment_id: submission.assignment_id,
            student_id: submission.student_id,
            status: Some(submission.status).into(),
            text: submission.text_content,
            grade: submission.grade,
            feedback: submission.feedback,
            late: submission.late,
            submitted_at: format_primitive(submission.submitted_at),
            approved_at: submission.approved_at.map(format_primitive),
            graded_by: submission.graded_by,
            graded_at: submission.graded_at.map(format_primitive),
            version: submission.version,
            files: files.into_iter().map(SubmissionFileResponse::from_db).collect(),
        }
    }
}

/// One row of the instructor listing; students without a submission show up
/// as `not_submitted` with every submission field empty.
#[derive(Debug, Serialize)]
pub(crate) struct RosterEntryResponse {
    pub(crate) student_id: String,
    pub(crate) student_username: String,
    pub(crate) student_name: String,
    pub(crate) submission_id: Option<String>,
    pub(crate) status: SubmissionState,
    pub(crate) text: Option<String>,
    pub(crate) grade: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) late: bool,
    pub(crate) submitted_at: Option<String>,
    pub(crate) approved_at: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) version: i64,
    pub(crate) files: Vec<SubmissionFileResponse>,
}

impl RosterEntryResponse {
    pub(crate) fn from_row(row: RosterRow, files: Vec<SubmissionFile>) -> Self {
        Self {
            student_id: row.student_id,
            student_username: row.username,
            student_name: row.full_name,
            submission_id: row.submission_id,
            status: row.status.into(),
            text: row.text_content,
            grade: row.grade,
            feedback: row.feedback,
            late: row.late.unwrap_or(false),
            submitted_at: row.submitted_at.map(format_primitive),
            approved_at: row.approved_at.map(format_primitive),
            graded_at: row.graded_at.map(format_primitive),
            version: row.version.unwrap_or(0),
            files: files.into_iter().map(SubmissionFileResponse::from_db).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmissionListQuery {
    #[serde(default)]
    pub(crate) status: Option<SubmissionState>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GradeRequest {
    pub(crate) grade: serde_json::Value,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
    #[serde(default = "default_review_status")]
    pub(crate) status: ReviewStatus,
    #[serde(default, alias = "expectedVersion")]
    pub(crate) expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkGradeRequest {
    #[serde(alias = "studentIds")]
    pub(crate) student_ids: Vec<String>,
    pub(crate) grade: serde_json::Value,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
    #[serde(default = "default_review_status")]
    pub(crate) status: ReviewStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkGradeFailure {
    pub(crate) student_id: String,
    pub(crate) reason: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkGradeResponse {
    pub(crate) status: SubmissionStatus,
    pub(crate) succeeded: Vec<String>,
    pub(crate) failed: Vec<BulkGradeFailure>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RejectRequest {
    #[serde(default)]
    pub(crate) reason: Option<String>,
    #[serde(default, alias = "expectedVersion")]
    pub(crate) expected_version: Option<i64>,
}

/// The caller's own submission for one assignment; `submission` is null
/// until something was handed in.
#[derive(Debug, Serialize)]
pub(crate) struct MySubmissionResponse {
    pub(crate) assignment_id: String,
    pub(crate) status: SubmissionState,
    pub(crate) submission: Option<SubmissionResponse>,
}

fn default_review_status() -> ReviewStatus {
    ReviewStatus::Graded
}
