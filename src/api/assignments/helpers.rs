use std::collections::HashMap;

use crate::api::errors::ApiError;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Assignment, Submission, SubmissionFile, User};
use crate::repositories;
use crate::repositories::submissions::ReviewUpdate;
use crate::services::notifications::SubmissionEvent;
use crate::services::submission_workflow::{decide_grade, CurrentSubmission, ReviewStatus};

pub(super) fn concurrent_modification() -> ApiError {
    ApiError::Conflict("Submission was modified concurrently; reload and try again".to_string())
}

pub(super) async fn current_submission(
    state: &AppState,
    assignment_id: &str,
    student_id: &str,
) -> Result<Option<Submission>, ApiError> {
    repositories::submissions::find(state.db(), assignment_id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))
}

pub(super) async fn submission_files(
    state: &AppState,
    submission_id: &str,
) -> Result<Vec<SubmissionFile>, ApiError> {
    repositories::submission_files::list_by_submission(state.db(), submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission files"))
}

pub(super) fn group_by_submission(files: Vec<SubmissionFile>) -> HashMap<String, Vec<SubmissionFile>> {
    let mut grouped: HashMap<String, Vec<SubmissionFile>> = HashMap::new();
    for file in files {
        grouped.entry(file.submission_id.clone()).or_default().push(file);
    }
    grouped
}

/// Parameters of one instructor review, already validated at the request edge.
pub(super) struct Review<'a> {
    pub(super) grade: f64,
    pub(super) status: ReviewStatus,
    pub(super) feedback: Option<&'a str>,
    pub(super) expected_version: Option<i64>,
}

/// Grades one student's submission and publishes the approval event when
/// the new status is `approved`. Shared by single and bulk grading.
pub(super) async fn grade_student(
    state: &AppState,
    assignment: &Assignment,
    student_id: &str,
    grader: &User,
    review: Review<'_>,
) -> Result<Submission, ApiError> {
    let current = current_submission(state, &assignment.id, student_id).await?;
    let decision = decide_grade(
        current.as_ref().map(CurrentSubmission::from),
        review.grade,
        review.status,
        review.expected_version,
    )?;

    let updated = repositories::submissions::apply_review(
        state.db(),
        ReviewUpdate {
            assignment_id: &assignment.id,
            student_id,
            status: decision.status,
            grade: decision.grade,
            feedback: review.feedback,
            graded_by: &grader.id,
            expected_version: decision.expected_version,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to grade submission"))?
    .ok_or_else(concurrent_modification)?;

    metrics::record_grade(updated.status.as_str());
    if decision.is_approval() {
        state.notifications().submission_approved(&SubmissionEvent::from(&updated)).await;
    }

    tracing::info!(
        assignment_id = %assignment.id,
        student_id = %student_id,
        grader_id = %grader.id,
        action = "grade",
        status = updated.status.as_str(),
        grade = decision.grade,
        version = updated.version,
        "Submission reviewed"
    );

    Ok(updated)
}
