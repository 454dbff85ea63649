use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::core::time::{deserialize_datetime_flexible, format_primitive};
use crate::db::models::{Assignment, AssignmentFile};
use crate::db::types::SubmissionState;
use crate::repositories::assignments::AssignmentForStudent;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AssignmentCreate {
    #[serde(alias = "groupId")]
    pub(crate) group_id: String,
    #[serde(alias = "subGroupId", alias = "subgroupId")]
    pub(crate) subgroup_id: String,
    #[validate(length(min = 1, max = 300, message = "title must be 1-300 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(deserialize_with = "deserialize_datetime_flexible")]
    pub(crate) deadline: OffsetDateTime,
    #[serde(default, alias = "allowResubmission")]
    pub(crate) allow_resubmission: bool,
    #[serde(default, alias = "allowLateSubmission")]
    pub(crate) allow_late_submission: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentFileResponse {
    pub(crate) id: String,
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) uploaded_at: String,
}

impl AssignmentFileResponse {
    pub(crate) fn from_db(file: AssignmentFile) -> Self {
        Self {
            id: file.id,
            filename: file.filename,
            mime_type: file.mime_type,
            file_size: file.file_size,
            uploaded_at: format_primitive(file.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentResponse {
    pub(crate) id: String,
    pub(crate) group_id: String,
    pub(crate) subgroup_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) deadline: String,
    pub(crate) allow_resubmission: bool,
    pub(crate) allow_late_submission: bool,
    pub(crate) is_closed: bool,
    pub(crate) closed_at: Option<String>,
    pub(crate) last_reminder_at: Option<String>,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) files: Vec<AssignmentFileResponse>,
}

impl AssignmentResponse {
    pub(crate) fn from_db(assignment: Assignment, files: Vec<AssignmentFile>) -> Self {
        Self {
            id: assignment.id,
            group_id: assignment.group_id,
            subgroup_id: assignment.subgroup_id,
            title: assignment.title,
            description: assignment.description,
            deadline: format_primitive(assignment.deadline),
            allow_resubmission: assignment.allow_resubmission,
            allow_late_submission: assignment.allow_late_submission,
            is_closed: assignment.closed_at.is_some(),
            closed_at: assignment.closed_at.map(format_primitive),
            last_reminder_at: assignment.last_reminder_at.map(format_primitive),
            created_by: assignment.created_by,
            created_at: format_primitive(assignment.created_at),
            files: files.into_iter().map(AssignmentFileResponse::from_db).collect(),
        }
    }
}

/// An assignment as one student sees it, with their own submission state.
#[derive(Debug, Serialize)]
pub(crate) struct StudentAssignmentResponse {
    #[serde(flatten)]
    pub(crate) assignment: AssignmentResponse,
    pub(crate) submission_status: SubmissionState,
    pub(crate) grade: Option<f64>,
    pub(crate) submission_version: Option<i64>,
}

impl StudentAssignmentResponse {
    pub(crate) fn from_row(row: AssignmentForStudent, files: Vec<AssignmentFile>) -> Self {
        Self {
            assignment: AssignmentResponse::from_db(row.assignment, files),
            submission_status: row.submission_status.into(),
            grade: row.submission_grade,
            submission_version: row.submission_version,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReminderResponse {
    pub(crate) assignment_id: String,
    pub(crate) reminded_students: Vec<String>,
    pub(crate) delivered: usize,
}
