use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::future::try_join_all;

use crate::api::assignments::helpers::{current_submission, submission_files};
use crate::api::errors::ApiError;
use crate::api::guards::{
    load_assignment, require_assignment_instructor, require_subgroup_access,
    require_subgroup_instructor, CurrentUser,
};
use crate::api::uploads::require_storage;
use crate::core::state::AppState;
use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::repositories;
use crate::services::export::{archive_name, build_archive, ExportFile, SubmissionManifest};
use crate::services::storage::sanitized_filename;

fn attachment(bytes: Vec<u8>, content_type: &str, filename: &str) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", sanitized_filename(filename)))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    ([(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)], bytes)
        .into_response()
}

/// Zip archive of one submission: metadata, text and every attachment.
pub(in crate::api::assignments) async fn export_submission(
    Path((assignment_id, student_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let assignment = require_assignment_instructor(&state, &user, &assignment_id).await?;
    let submission = current_submission(&state, &assignment.id, &student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No submission to export".to_string()))?;

    let files = submission_files(&state, &submission.id).await?;
    let student_name = repositories::users::find_name_by_id(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
        .unwrap_or_default();

    let contents = if files.is_empty() {
        Vec::new()
    } else {
        let storage = require_storage(state.storage())?;
        try_join_all(files.iter().map(|file| async move {
            let bytes = storage
                .download_bytes(&file.storage_key)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to download submission file"))?;
            Ok::<_, ApiError>(ExportFile {
                filename: file.filename.clone(),
                mime_type: file.mime_type.clone(),
                sha256: file.sha256.clone(),
                bytes,
            })
        }))
        .await?
    };

    let manifest = SubmissionManifest {
        submission_id: submission.id.clone(),
        assignment_id: assignment.id.clone(),
        assignment_title: assignment.title.clone(),
        student_id: student_id.clone(),
        student_name,
        status: submission.status.as_str().to_string(),
        grade: submission.grade,
        feedback: submission.feedback.clone(),
        late: submission.late,
        submitted_at: format_primitive(submission.submitted_at),
        approved_at: submission.approved_at.map(format_primitive),
        version: submission.version,
        files: Vec::new(),
    };

    let archive = build_archive(manifest, submission.text_content.as_deref(), contents)
        .map_err(|e| ApiError::internal(e, "Failed to build submission archive"))?;

    tracing::info!(
        assignment_id = %assignment.id,
        student_id = %student_id,
        action = "export",
        bytes = archive.len(),
        "Submission exported"
    );

    Ok(attachment(archive, "application/zip", &archive_name(&submission.id)))
}

/// Streams a stored file back to a caller allowed to see it. Assignment and
/// resource files are visible to the subgroup; submission files only to
/// their author and the subgroup's instructors.
pub(in crate::api::assignments) async fn download_file(
    Path(file_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let (storage_key, filename, mime_type) = resolve_file(&state, &user, &file_id).await?;
    let storage = require_storage(state.storage())?;

    let bytes = storage
        .download_bytes(&storage_key)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to download file"))?;

    Ok(attachment(bytes, &mime_type, &filename))
}

async fn resolve_file(
    state: &AppState,
    user: &User,
    file_id: &str,
) -> Result<(String, String, String), ApiError> {
    let not_found = || ApiError::NotFound("File not found".to_string());

    if let Some(file) = repositories::assignment_files::find_by_id(state.db(), file_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch file"))?
    {
        let assignment = load_assignment(state, &file.assignment_id).await?;
        require_subgroup_access(state, user, &assignment.group_id, &assignment.subgroup_id).await?;
        return Ok((file.storage_key, file.filename, file.mime_type));
    }

    if let Some(file) = repositories::submission_files::find_by_id(state.db(), file_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch file"))?
    {
        if file.student_id != user.id {
            let assignment = load_assignment(state, &file.assignment_id).await?;
            require_subgroup_instructor(state, user, &assignment.subgroup_id).await?;
        }
        return Ok((file.storage_key, file.filename, file.mime_type));
    }

    let resource = repositories::resources::find_by_id(state.db(), file_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch file"))?
        .ok_or_else(not_found)?;
    require_subgroup_access(state, user, &resource.group_id, &resource.subgroup_id).await?;

    match (resource.storage_key, resource.filename) {
        (Some(storage_key), Some(filename)) => Ok((
            storage_key,
            filename,
            resource.mime_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        )),
        _ => Err(not_found()),
    }
}
