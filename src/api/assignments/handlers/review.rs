use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::assignments::helpers::{
    concurrent_modification, current_submission, grade_student, group_by_submission,
    submission_files, Review,
};
use crate::api::errors::ApiError;
use crate::api::guards::{require_assignment_instructor, CurrentUser, VerifiedToken};
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::SubmissionStatus;
use crate::repositories;
use crate::repositories::submissions::ReviewUpdate;
use crate::schemas::submission::{
    BulkGradeFailure, BulkGradeRequest, BulkGradeResponse, GradeRequest, RejectRequest,
    RosterEntryResponse, SubmissionListQuery, SubmissionResponse,
};
use crate::services::bulk_grading::{dedupe_ids, fan_out};
use crate::services::submission_workflow::{decide_reject, parse_grade, CurrentSubmission};

/// Every student of the subgroup with their submission state, optionally
/// filtered by `?status=`.
pub(in crate::api::assignments) async fn list_submissions(
    Path(assignment_id): Path<String>,
    Query(params): Query<SubmissionListQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<RosterEntryResponse>>, ApiError> {
    let assignment = require_assignment_instructor(&state, &user, &assignment_id).await?;

    let (roster, files) = tokio::try_join!(
        repositories::submissions::list_roster(state.db(), &assignment.id, &assignment.subgroup_id),
        repositories::submission_files::list_by_assignment(state.db(), &assignment.id),
    )
    .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    let mut files = group_by_submission(files);
    let entries = roster
        .into_iter()
        .map(|row| {
            let row_files = row
                .submission_id
                .as_ref()
                .and_then(|id| files.remove(id))
                .unwrap_or_default();
            RosterEntryResponse::from_row(row, row_files)
        })
        .filter(|entry| params.status.map_or(true, |status| entry.status == status))
        .collect();

    Ok(Json(entries))
}

pub(in crate::api::assignments) async fn grade_submission(
    Path((assignment_id, student_id)): Path<(String, String)>,
    token: VerifiedToken,
    State(state): State<AppState>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let grade = parse_grade(&payload.grade)?;
    let user = token.load_user(&state).await?;
    let assignment = require_assignment_instructor(&state, &user, &assignment_id).await?;

    let submission = grade_student(
        &state,
        &assignment,
        &student_id,
        &user,
        Review {
            grade,
            status: payload.status,
            feedback: payload.feedback.as_deref(),
            expected_version: payload.expected_version,
        },
    )
    .await?;

    let files = submission_files(&state, &submission.id).await?;
    Ok(Json(SubmissionResponse::from_db(submission, files)))
}

/// Applies one grade to many students. Each student succeeds or fails on its
/// own; the response lists both sides.
pub(in crate::api::assignments) async fn bulk_grade(
    Path(assignment_id): Path<String>,
    token: VerifiedToken,
    State(state): State<AppState>,
    Json(payload): Json<BulkGradeRequest>,
) -> Result<Json<BulkGradeResponse>, ApiError> {
    let grade = parse_grade(&payload.grade)?;
    let student_ids = dedupe_ids(&payload.student_ids);
    if student_ids.is_empty() {
        return Err(ApiError::BadRequest("student_ids must not be empty".to_string()));
    }

    let user = token.load_user(&state).await?;
    let assignment = require_assignment_instructor(&state, &user, &assignment_id).await?;

    let concurrency = state.settings().coursework().bulk_grade_concurrency;
    let outcomes = fan_out(student_ids, concurrency, |student_id: String| {
        let state = &state;
        let assignment = &assignment;
        let user = &user;
        let feedback = payload.feedback.as_deref();
        let status = payload.status;
        async move {
            let review = Review { grade, status, feedback, expected_version: None };
            grade_student(state, assignment, &student_id, user, review).await
        }
    })
    .await;

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(_) => succeeded.push(outcome.key),
            Err(err) => failed.push(BulkGradeFailure { student_id: outcome.key, reason: err.detail() }),
        }
    }

    metrics::record_bulk_grade_items(succeeded.len(), failed.len());
    tracing::info!(
        assignment_id = %assignment.id,
        grader_id = %user.id,
        action = "bulk_grade",
        succeeded = succeeded.len(),
        failed = failed.len(),
        "Bulk grading finished"
    );

    Ok(Json(BulkGradeResponse { status: SubmissionStatus::from(payload.status), succeeded, failed }))
}

/// Sets the submission to `rejected` with grade 0. Attachments are kept.
pub(in crate::api::assignments) async fn reject_submission(
    Path((assignment_id, student_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<RejectRequest>>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let assignment = require_assignment_instructor(&state, &user, &assignment_id).await?;
    let Json(payload) = payload.unwrap_or_default();

    let current = current_submission(&state, &assignment.id, &student_id).await?;
    let decision = decide_reject(
        current.as_ref().map(CurrentSubmission::from),
        payload.reason.as_deref(),
        payload.expected_version,
    )?;

    let submission = repositories::submissions::apply_review(
        state.db(),
        ReviewUpdate {
            assignment_id: &assignment.id,
            student_id: &student_id,
            status: SubmissionStatus::Rejected,
            grade: 0.0,
            feedback: Some(&decision.feedback),
            graded_by: &user.id,
            expected_version: decision.expected_version,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to reject submission"))?
    .ok_or_else(concurrent_modification)?;

    metrics::record_grade(SubmissionStatus::Rejected.as_str());
    tracing::info!(
        assignment_id = %assignment.id,
        student_id = %student_id,
        grader_id = %user.id,
        action = "reject",
        version = submission.version,
        "Submission rejected"
    );

    let files = submission_files(&state, &submission.id).await?;
    Ok(Json(SubmissionResponse::from_db(submission, files)))
}
