use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{load_assignment, require_subgroup_access, CurrentUser};
use crate::core::state::AppState;
use crate::db::models::AssignmentFile;
use crate::db::types::{SubmissionState, UserRole};
use crate::repositories;
use crate::schemas::assignment::StudentAssignmentResponse;
use crate::schemas::group::{GroupResponse, SubGroupResponse};
use crate::schemas::resource::ResourceResponse;
use crate::schemas::submission::{MySubmissionResponse, SubmissionResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/groups", get(list_groups))
        .route("/groups/:group_id/subgroups", get(list_subgroups))
        .route("/resources/:group_id/:subgroup_id", get(list_resources))
        .route("/assignments/:group_id/:subgroup_id", get(list_assignments))
        .route("/submissions/:assignment_id", get(my_submission))
}

/// Groups the caller belongs to through any subgroup; admins see all.
async fn list_groups(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<GroupResponse>>, ApiError> {
    let groups = if user.role == UserRole::Admin {
        repositories::groups::list_all_groups(state.db()).await
    } else {
        repositories::groups::list_groups_for_user(state.db(), &user.id).await
    }
    .map_err(|e| ApiError::internal(e, "Failed to list groups"))?;

    Ok(Json(groups.into_iter().map(GroupResponse::from_db).collect()))
}

async fn list_subgroups(
    Path(group_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubGroupResponse>>, ApiError> {
    repositories::groups::find_group(state.db(), &group_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch group"))?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    let subgroups = if user.role == UserRole::Admin {
        repositories::groups::list_subgroups(state.db(), &group_id).await
    } else {
        repositories::groups::list_subgroups_for_user(state.db(), &group_id, &user.id).await
    }
    .map_err(|e| ApiError::internal(e, "Failed to list subgroups"))?;

    if subgroups.is_empty() && user.role != UserRole::Admin {
        return Err(ApiError::Forbidden("Membership required for this group"));
    }

    Ok(Json(subgroups.into_iter().map(SubGroupResponse::from_db).collect()))
}

async fn list_resources(
    Path((group_id, subgroup_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResourceResponse>>, ApiError> {
    require_subgroup_access(&state, &user, &group_id, &subgroup_id).await?;

    let resources = repositories::resources::list_by_subgroup(state.db(), &group_id, &subgroup_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list resources"))?;

    Ok(Json(resources.into_iter().map(ResourceResponse::from_db).collect()))
}

/// Assignments of a subgroup, each carrying the caller's own submission state.
async fn list_assignments(
    Path((group_id, subgroup_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentAssignmentResponse>>, ApiError> {
    require_subgroup_access(&state, &user, &group_id, &subgroup_id).await?;

    let rows =
        repositories::assignments::list_for_student(state.db(), &group_id, &subgroup_id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list assignments"))?;

    let ids: Vec<String> = rows.iter().map(|row| row.assignment.id.clone()).collect();
    let files = repositories::assignment_files::list_by_assignments(state.db(), &ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assignment files"))?;

    let mut files_by_assignment: HashMap<String, Vec<AssignmentFile>> = HashMap::new();
    for file in files {
        files_by_assignment.entry(file.assignment_id.clone()).or_default().push(file);
    }

    Ok(Json(
        rows.into_iter()
            .map(|row| {
                let files = files_by_assignment.remove(&row.assignment.id).unwrap_or_default();
                StudentAssignmentResponse::from_row(row, files)
            })
            .collect(),
    ))
}

async fn my_submission(
    Path(assignment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<MySubmissionResponse>, ApiError> {
    let assignment = load_assignment(&state, &assignment_id).await?;
    require_subgroup_access(&state, &user, &assignment.group_id, &assignment.subgroup_id).await?;

    let submission = repositories::submissions::find(state.db(), &assignment.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?;

    let Some(submission) = submission else {
        return Ok(Json(MySubmissionResponse {
            assignment_id: assignment.id,
            status: SubmissionState::NotSubmitted,
            submission: None,
        }));
    };

    let files = repositories::submission_files::list_by_submission(state.db(), &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission files"))?;

    Ok(Json(MySubmissionResponse {
        assignment_id: assignment.id,
        status: Some(submission.status).into(),
        submission: Some(SubmissionResponse::from_db(submission, files)),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::db::types::{MemberRole, UserRole};
    use crate::test_support::{self, AssignmentSetup};

    #[tokio::test]
    #[ignore = "requires postgres and redis"]
    async fn student_sees_own_groups_and_assignment_state() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let instructor = test_support::insert_user(db, "lecturer9", UserRole::Instructor).await;
        let student = test_support::insert_user(db, "pupil9", UserRole::Student).await;
        let outsider = test_support::insert_user(db, "outsider9", UserRole::Student).await;
        let (group, subgroup) = test_support::insert_group_with_subgroup(db, &instructor.id).await;
        test_support::add_member(db, &subgroup.id, &student.id, MemberRole::Student).await;
        let assignment =
            test_support::insert_assignment(db, &subgroup, &instructor.id, AssignmentSetup::default())
                .await;
        let token = test_support::bearer_token(&student, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/student/groups", Some(&token), None))
            .await
            .expect("groups");
        assert_eq!(response.status(), StatusCode::OK);
        let groups = test_support::read_json(response).await;
        assert_eq!(groups[0]["id"], group.id);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/student/assignments/{}/{}", group.id, subgroup.id),
                Some(&token),
                None,
            ))
            .await
            .expect("assignments");
        assert_eq!(response.status(), StatusCode::OK);
        let assignments = test_support::read_json(response).await;
        assert_eq!(assignments[0]["id"], assignment.id);
        assert_eq!(assignments[0]["submission_status"], "not_submitted");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/student/submissions/{}", assignment.id),
                Some(&token),
                None,
            ))
            .await
            .expect("own submission");
        let mine = test_support::read_json(response).await;
        assert_eq!(mine["status"], "not_submitted");
        assert!(mine["submission"].is_null());

        let outsider_token = test_support::bearer_token(&outsider, ctx.state.settings());
        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/student/resources/{}/{}", group.id, subgroup.id),
                Some(&outsider_token),
                None,
            ))
            .await
            .expect("resources");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
