use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::MemberRole;
use crate::repositories;
use crate::schemas::group::{
    GroupCreate, GroupResponse, MemberAdd, MemberResponse, SubGroupCreate, SubGroupResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_group))
        .route("/:group_id/subgroups", post(create_subgroup))
        .route("/subgroups/:subgroup_id/members", post(add_member))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db_err| db_err.is_unique_violation())
}

async fn create_group(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<GroupCreate>,
) -> Result<(StatusCode, Json<GroupResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let group = repositories::groups::create_group(
        state.db(),
        repositories::groups::CreateGroup {
            id: &Uuid::new_v4().to_string(),
            name: payload.name.trim(),
            description: payload.description.as_deref(),
            created_by: &admin.id,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create group"))?;

    tracing::info!(group_id = %group.id, admin_id = %admin.id, "Group created");
    Ok((StatusCode::CREATED, Json(GroupResponse::from_db(group))))
}

async fn create_subgroup(
    Path(group_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<SubGroupCreate>,
) -> Result<(StatusCode, Json<SubGroupResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    repositories::groups::find_group(state.db(), &group_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch group"))?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    let subgroup = repositories::groups::create_subgroup(
        state.db(),
        &Uuid::new_v4().to_string(),
        &group_id,
        payload.name.trim(),
        primitive_now_utc(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("A subgroup with this name already exists".to_string())
        } else {
            ApiError::internal(e, "Failed to create subgroup")
        }
    })?;

    tracing::info!(
        group_id = %group_id,
        subgroup_id = %subgroup.id,
        admin_id = %admin.id,
        "Subgroup created"
    );
    Ok((StatusCode::CREATED, Json(SubGroupResponse::from_db(subgroup))))
}

/// Adds a user to a subgroup or changes their role there. Only staff accounts
/// can hold the instructor role.
async fn add_member(
    Path(subgroup_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<MemberAdd>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    repositories::groups::find_subgroup(state.db(), &subgroup_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch subgroup"))?
        .ok_or_else(|| ApiError::NotFound("Subgroup not found".to_string()))?;

    let user = repositories::users::find_by_id(state.db(), &payload.user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if payload.role == MemberRole::Instructor && !user.role.is_staff() {
        return Err(ApiError::BadRequest(
            "Only instructor or admin accounts can be subgroup instructors".to_string(),
        ));
    }

    let member = repositories::groups::upsert_member(
        state.db(),
        &subgroup_id,
        &user.id,
        payload.role,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to add member"))?;

    tracing::info!(
        subgroup_id = %subgroup_id,
        user_id = %user.id,
        role = ?member.role,
        admin_id = %admin.id,
        "Subgroup member added"
    );
    Ok((StatusCode::CREATED, Json(MemberResponse::from_db(member))))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::UserRole;
    use crate::test_support;

    #[tokio::test]
    #[ignore = "requires postgres and redis"]
    async fn admin_builds_group_structure_and_roles_are_checked() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let admin = test_support::insert_user(db, "root", UserRole::Admin).await;
        let student = test_support::insert_user(db, "learner", UserRole::Student).await;
        let token = test_support::bearer_token(&admin, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/groups",
                Some(&token),
                Some(json!({"name": "Physics"})),
            ))
            .await
            .expect("create group");
        assert_eq!(response.status(), StatusCode::CREATED);
        let group = test_support::read_json(response).await;

        let subgroup_uri = format!("/api/groups/{}/subgroups", group["id"].as_str().unwrap());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &subgroup_uri,
                Some(&token),
                Some(json!({"name": "Lab B"})),
            ))
            .await
            .expect("create subgroup");
        assert_eq!(response.status(), StatusCode::CREATED);
        let subgroup = test_support::read_json(response).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &subgroup_uri,
                Some(&token),
                Some(json!({"name": "Lab B"})),
            ))
            .await
            .expect("duplicate subgroup");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let members_uri =
            format!("/api/groups/subgroups/{}/members", subgroup["id"].as_str().unwrap());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &members_uri,
                Some(&token),
                Some(json!({"userId": student.id, "role": "instructor"})),
            ))
            .await
            .expect("student as instructor");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &members_uri,
                Some(&token),
                Some(json!({"userId": student.id, "role": "student"})),
            ))
            .await
            .expect("student member");
        assert_eq!(response.status(), StatusCode::CREATED);

        let student_token = test_support::bearer_token(&student, ctx.state.settings());
        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/groups",
                Some(&student_token),
                Some(json!({"name": "Nope"})),
            ))
            .await
            .expect("non-admin");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
