use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::api::assignments::helpers::{concurrent_modification, current_submission};
use crate::api::errors::ApiError;
use crate::api::guards::{load_assignment, CurrentUser};
use crate::api::uploads::{discard, read_form, require_storage, store_files, StoredUpload};
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Submission, SubmissionFile};
use crate::db::types::MemberRole;
use crate::repositories;
use crate::repositories::submission_files::NewSubmissionFile;
use crate::repositories::submissions::SubmitUpsert;
use crate::schemas::submission::SubmissionResponse;
use crate::services::submission_workflow::{
    decide_submit, AssignmentRules, CurrentSubmission, SubmitDecision, WorkflowError,
};

/// Accepts text and/or files for the caller's own submission. A first
/// submission answers 201, a resubmission 200.
pub(in crate::api::assignments) async fn submit_assignment(
    Path(assignment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    let assignment = load_assignment(&state, &assignment_id).await?;

    let member_role =
        repositories::groups::find_member_role(state.db(), &assignment.subgroup_id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch subgroup membership"))?;
    if member_role != Some(MemberRole::Student) {
        return Err(WorkflowError::NotAStudentMember.into());
    }

    let form = read_form(&mut multipart, state.settings()).await?;
    let text = form.text("text").map(str::to_string);

    let current = current_submission(&state, &assignment.id, &user.id).await?;
    let decision = decide_submit(
        AssignmentRules::from(&assignment),
        current.as_ref().map(CurrentSubmission::from),
        text.is_some() || !form.files.is_empty(),
        primitive_now_utc(),
    )?;

    let uploads = if form.files.is_empty() {
        Vec::new()
    } else {
        let storage = require_storage(state.storage())?;
        let prefix = format!("submissions/{}/{}", assignment.id, user.id);
        store_files(storage, &prefix, form.files).await?
    };

    let stored = persist(&state, &assignment.id, &user.id, text.as_deref(), decision, &uploads).await;
    let (submission, files, replaced) = match stored {
        Ok(stored) => stored,
        Err(err) => {
            if let Some(storage) = state.storage() {
                discard(storage, uploads.iter().map(|u| u.storage_key.clone()).collect()).await;
            }
            return Err(err);
        }
    };

    if !replaced.is_empty() {
        if let Some(storage) = state.storage() {
            discard(storage, replaced).await;
        }
    }

    metrics::record_submission(submission.late);
    tracing::info!(
        assignment_id = %assignment.id,
        student_id = %user.id,
        action = "submit",
        late = submission.late,
        files = files.len(),
        version = submission.version,
        "Submission stored"
    );

    let status = if current.is_some() { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(SubmissionResponse::from_db(submission, files))))
}

/// Writes the submission row and its file set in one transaction. Returns the
/// storage keys of attachments that were replaced.
async fn persist(
    state: &AppState,
    assignment_id: &str,
    student_id: &str,
    text: Option<&str>,
    decision: SubmitDecision,
    uploads: &[StoredUpload],
) -> Result<(Submission, Vec<SubmissionFile>, Vec<String>), ApiError> {
    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let submission = repositories::submissions::upsert_submitted(
        &mut *tx,
        SubmitUpsert {
            id: &Uuid::new_v4().to_string(),
            assignment_id,
            student_id,
            text_content: text,
            late: decision.late,
            expected_version: decision.expected_version,
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store submission"))?
    .ok_or_else(concurrent_modification)?;

    let new_files: Vec<NewSubmissionFile> = uploads
        .iter()
        .map(|upload| NewSubmissionFile {
            id: upload.id.clone(),
            filename: upload.filename.clone(),
            storage_key: upload.storage_key.clone(),
            mime_type: upload.mime_type.clone(),
            file_size: upload.file_size,
            sha256: upload.sha256.clone(),
        })
        .collect();

    let replaced = repositories::submission_files::replace_for_submission(
        &mut tx,
        &submission.id,
        assignment_id,
        student_id,
        &new_files,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store submission files"))?;

    let files = repositories::submission_files::list_by_submission(&mut *tx, &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission files"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit submission"))?;

    Ok((submission, files, replaced))
}
