use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{require_subgroup_access, require_subgroup_instructor, CurrentUser};
use crate::api::uploads::{discard, read_form, require_storage, store_files};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::resources::{CreateResource, StoredBlob};
use crate::schemas::resource::ResourceResponse;

const MAX_TITLE_LEN: usize = 300;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:group_id/:subgroup_id", post(create_resource))
}

/// Multipart fields: `title`, optional `description`, optional single `file`.
async fn create_resource(
    Path((group_id, subgroup_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResourceResponse>), ApiError> {
    require_subgroup_access(&state, &user, &group_id, &subgroup_id).await?;
    require_subgroup_instructor(&state, &user, &subgroup_id).await?;

    let mut form = read_form(&mut multipart, state.settings()).await?;
    let title = form
        .text("title")
        .ok_or_else(|| ApiError::BadRequest("title is required".to_string()))?
        .to_string();
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::BadRequest(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    let description = form.text("description").map(str::to_string);

    if form.files.len() > 1 {
        return Err(ApiError::BadRequest("A resource carries at most one file".to_string()));
    }

    let upload = match form.files.pop() {
        Some(file) => {
            let storage = require_storage(state.storage())?;
            let prefix = format!("resources/{group_id}/{subgroup_id}");
            store_files(storage, &prefix, vec![file]).await?.pop()
        }
        None => None,
    };

    let created = repositories::resources::create(
        state.db(),
        CreateResource {
            id: &Uuid::new_v4().to_string(),
            group_id: &group_id,
            subgroup_id: &subgroup_id,
            title: &title,
            description: description.as_deref(),
            file: upload.as_ref().map(|upload| StoredBlob {
                storage_key: &upload.storage_key,
                filename: &upload.filename,
                mime_type: &upload.mime_type,
                file_size: upload.file_size,
                sha256: &upload.sha256,
            }),
            created_by: &user.id,
            now: primitive_now_utc(),
        },
    )
    .await;

    let resource = match created {
        Ok(resource) => resource,
        Err(err) => {
            if let (Some(storage), Some(upload)) = (state.storage(), upload.as_ref()) {
                discard(storage, vec![upload.storage_key.clone()]).await;
            }
            return Err(ApiError::internal(err, "Failed to create resource"));
        }
    };

    tracing::info!(
        resource_id = %resource.id,
        subgroup_id = %subgroup_id,
        has_file = resource.storage_key.is_some(),
        "Resource created"
    );

    Ok((StatusCode::CREATED, Json(ResourceResponse::from_db(resource))))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::db::types::{MemberRole, UserRole};
    use crate::test_support;

    #[tokio::test]
    #[ignore = "requires postgres and redis"]
    async fn instructor_posts_text_resource_and_student_cannot() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let instructor = test_support::insert_user(db, "lecturer", UserRole::Instructor).await;
        let student = test_support::insert_user(db, "reader", UserRole::Student).await;
        let (group, subgroup) = test_support::insert_group_with_subgroup(db, &instructor.id).await;
        test_support::add_member(db, &subgroup.id, &instructor.id, MemberRole::Instructor).await;
        test_support::add_member(db, &subgroup.id, &student.id, MemberRole::Student).await;
        let uri = format!("/api/resources/{}/{}", group.id, subgroup.id);

        let token = test_support::bearer_token(&instructor, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::multipart_request(
                &uri,
                &token,
                &[("title", "Reading list"), ("description", "Chapters 1-3")],
            ))
            .await
            .expect("create resource");
        assert_eq!(response.status(), StatusCode::CREATED);
        let resource = test_support::read_json(response).await;
        assert_eq!(resource["title"], "Reading list");
        assert!(resource["file"].is_null());

        let token = test_support::bearer_token(&student, ctx.state.settings());
        let response = ctx
            .app
            .oneshot(test_support::multipart_request(&uri, &token, &[("title", "Mine")]))
            .await
            .expect("student resource");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
