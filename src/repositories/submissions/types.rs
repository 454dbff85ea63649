use time::PrimitiveDateTime;

use crate::db::types::SubmissionStatus;

pub(crate) const COLUMNS: &str = "\
    id, assignment_id, student_id, text_content, status, grade, feedback, late, \
    submitted_at, approved_at, graded_by, graded_at, version, created_at, updated_at";

/// One student of an assignment's subgroup with their submission, if any.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RosterRow {
    pub(crate) student_id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) submission_id: Option<String>,
    pub(crate) status: Option<SubmissionStatus>,
    pub(crate) grade: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) late: Option<bool>,
    pub(crate) text_content: Option<String>,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) approved_at: Option<PrimitiveDateTime>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) version: Option<i64>,
}

pub(crate) struct SubmitUpsert<'a> {
    pub(crate) id: &'a str,
    pub(crate) assignment_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) text_content: Option<&'a str>,
    pub(crate) late: bool,
    pub(crate) expected_version: Option<i64>,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) struct ReviewUpdate<'a> {
    pub(crate) assignment_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) status: SubmissionStatus,
    pub(crate) grade: f64,
    pub(crate) feedback: Option<&'a str>,
    pub(crate) graded_by: &'a str,
    pub(crate) expected_version: i64,
    pub(crate) now: PrimitiveDateTime,
}
