use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{
    load_assignment, require_assignment_instructor, require_subgroup_access,
    require_subgroup_instructor, CurrentUser,
};
use crate::api::uploads::{discard, read_form, require_storage, store_files};
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::AssignmentFile;
use crate::repositories;
use crate::schemas::assignment::{
    AssignmentCreate, AssignmentFileResponse, AssignmentResponse, ReminderResponse,
};
use crate::services::notifications::ReminderEvent;

pub(in crate::api::assignments) async fn create_assignment(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AssignmentCreate>,
) -> Result<(StatusCode, Json<AssignmentResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let subgroup = repositories::groups::find_subgroup(state.db(), &payload.subgroup_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch subgroup"))?
        .filter(|subgroup| subgroup.group_id == payload.group_id)
        .ok_or_else(|| ApiError::NotFound("Subgroup not found".to_string()))?;
    require_subgroup_instructor(&state, &user, &subgroup.id).await?;

    let assignment = repositories::assignments::create(
        state.db(),
        repositories::assignments::CreateAssignment {
            id: &Uuid::new_v4().to_string(),
            group_id: &subgroup.group_id,
            subgroup_id: &subgroup.id,
            title: payload.title.trim(),
            description: payload.description.as_deref(),
            deadline: to_primitive_utc(payload.deadline),
            allow_resubmission: payload.allow_resubmission,
            allow_late_submission: payload.allow_late_submission,
            created_by: &user.id,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create assignment"))?;

    tracing::info!(
        assignment_id = %assignment.id,
        subgroup_id = %assignment.subgroup_id,
        instructor_id = %user.id,
        "Assignment created"
    );

    Ok((StatusCode::CREATED, Json(AssignmentResponse::from_db(assignment, Vec::new()))))
}

/// Every assignment of a subgroup with its attachments, for its instructors.
pub(in crate::api::assignments) async fn list_subgroup_assignments(
    Path((group_id, subgroup_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AssignmentResponse>>, ApiError> {
    require_subgroup_access(&state, &user, &group_id, &subgroup_id).await?;
    require_subgroup_instructor(&state, &user, &subgroup_id).await?;

    let assignments =
        repositories::assignments::list_by_subgroup(state.db(), &group_id, &subgroup_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list assignments"))?;

    let ids: Vec<String> = assignments.iter().map(|assignment| assignment.id.clone()).collect();
    let files = repositories::assignment_files::list_by_assignments(state.db(), &ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assignment files"))?;

    let mut files_by_assignment: HashMap<String, Vec<AssignmentFile>> = HashMap::new();
    for file in files {
        files_by_assignment.entry(file.assignment_id.clone()).or_default().push(file);
    }

    Ok(Json(
        assignments
            .into_iter()
            .map(|assignment| {
                let files = files_by_assignment.remove(&assignment.id).unwrap_or_default();
                AssignmentResponse::from_db(assignment, files)
            })
            .collect(),
    ))
}

pub(in crate::api::assignments) async fn get_assignment(
    Path(assignment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let assignment = load_assignment(&state, &assignment_id).await?;
    require_subgroup_access(&state, &user, &assignment.group_id, &assignment.subgroup_id).await?;

    let files = repositories::assignment_files::list_by_assignment(state.db(), &assignment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assignment files"))?;

    Ok(Json(AssignmentResponse::from_db(assignment, files)))
}

pub(in crate::api::assignments) async fn upload_assignment_files(
    Path(assignment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<AssignmentFileResponse>>), ApiError> {
    let assignment = require_assignment_instructor(&state, &user, &assignment_id).await?;
    let storage = require_storage(state.storage())?;

    let form = read_form(&mut multipart, state.settings()).await?;
    if form.files.is_empty() {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    }

    let uploads =
        store_files(storage, &format!("assignments/{}", assignment.id), form.files).await?;

    let now = primitive_now_utc();
    let mut created = Vec::with_capacity(uploads.len());
    for upload in &uploads {
        let result = repositories::assignment_files::create(
            state.db(),
            repositories::assignment_files::CreateAssignmentFile {
                id: &upload.id,
                assignment_id: &assignment.id,
                filename: &upload.filename,
                storage_key: &upload.storage_key,
                mime_type: &upload.mime_type,
                file_size: upload.file_size,
                sha256: &upload.sha256,
                uploaded_by: &user.id,
                created_at: now,
            },
        )
        .await;

        match result {
            Ok(file) => created.push(file),
            Err(err) => {
                let orphaned = uploads[created.len()..]
                    .iter()
                    .map(|upload| upload.storage_key.clone())
                    .collect();
                discard(storage, orphaned).await;
                return Err(ApiError::internal(err, "Failed to save assignment file"));
            }
        }
    }

    tracing::info!(
        assignment_id = %assignment.id,
        files = created.len(),
        "Assignment files uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(created.into_iter().map(AssignmentFileResponse::from_db).collect()),
    ))
}

pub(in crate::api::assignments) async fn close_assignment(
    Path(assignment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let assignment = require_assignment_instructor(&state, &user, &assignment_id).await?;
    let already_closed = assignment.closed_at.is_some();

    let closed = repositories::assignments::close(state.db(), &assignment.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to close assignment"))?
        .ok_or_else(|| ApiError::NotFound("Assignment not found".to_string()))?;

    if !already_closed {
        tracing::info!(assignment_id = %closed.id, instructor_id = %user.id, "Assignment closed");
    }

    let files = repositories::assignment_files::list_by_assignment(state.db(), &closed.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assignment files"))?;

    Ok(Json(AssignmentResponse::from_db(closed, files)))
}

/// Pushes a reminder to every student of the subgroup who has not submitted.
pub(in crate::api::assignments) async fn remind_assignment(
    Path(assignment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ReminderResponse>, ApiError> {
    let assignment = require_assignment_instructor(&state, &user, &assignment_id).await?;
    if assignment.closed_at.is_some() {
        return Err(ApiError::Conflict("Assignment is closed".to_string()));
    }

    let roster =
        repositories::submissions::list_roster(state.db(), &assignment.id, &assignment.subgroup_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load subgroup roster"))?;
    let reminded: Vec<String> = roster
        .into_iter()
        .filter(|row| row.submission_id.is_none())
        .map(|row| row.student_id)
        .collect();

    let cooldown_key = format!("reminder:{}", assignment.id);
    let cooldown = state.settings().coursework().reminder_cooldown_seconds;
    let acquired = state.redis().acquire_cooldown(&cooldown_key, cooldown).await.unwrap_or(true);
    if !acquired {
        return Err(ApiError::TooManyRequests("A reminder was sent recently"));
    }

    if let Err(err) =
        repositories::assignments::stamp_reminder(state.db(), &assignment.id, primitive_now_utc())
            .await
    {
        if let Err(release_err) = state.redis().release_cooldown(&cooldown_key).await {
            tracing::warn!(
                assignment_id = %assignment.id,
                error = %release_err,
                "Failed to release reminder cooldown"
            );
        }
        return Err(ApiError::internal(err, "Failed to record reminder"));
    }

    let event = ReminderEvent::from(&assignment);
    let mut delivered = 0;
    for student_id in &reminded {
        delivered += state.notifications().assignment_reminder(student_id, &event).await;
    }

    metrics::record_reminders(reminded.len());

    tracing::info!(
        assignment_id = %assignment.id,
        reminded = reminded.len(),
        delivered,
        "Assignment reminder sent"
    );

    Ok(Json(ReminderResponse {
        assignment_id: assignment.id,
        reminded_students: reminded,
        delivered,
    }))
}
