use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::{header, request::Parts};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::core::security::{self, Claims};
use crate::core::state::AppState;
use crate::db::models::{Assignment, SubGroup, User};
use crate::db::types::{MemberRole, UserRole};
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);

/// Like [`CurrentUser`] but also accepts `?token=` for clients that cannot
/// set headers on a WebSocket upgrade.
pub(crate) struct SocketUser(pub(crate) User);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_from_header(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn app_state(parts: &mut Parts, state: &AppState) -> Result<AppState, ApiError> {
    let State(app_state) = State::<AppState>::from_request_parts(parts, state)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;
    Ok(app_state)
}

fn verify(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    security::verify_token(token, state.settings())
        .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))
}

async fn load_user(state: &AppState, claims: &Claims) -> Result<User, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &claims.sub)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

    let Some(user) = user else {
        return Err(ApiError::Unauthorized("User not found"));
    };

    if !user.is_active {
        return Err(ApiError::Unauthorized("Invalid authentication credentials"));
    }

    Ok(user)
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = verify(state, token)?;
    load_user(state, &claims).await
}

/// A bearer token with a valid signature and expiry whose user row has not
/// been loaded yet. Lets a handler reject a bad body before touching the
/// database.
pub(crate) struct VerifiedToken(Claims);

impl VerifiedToken {
    pub(crate) async fn load_user(&self, state: &AppState) -> Result<User, ApiError> {
        load_user(state, &self.0).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for VerifiedToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;
        let token = bearer_from_header(parts)
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        verify(&app_state, token).map(VerifiedToken)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;
        let token = bearer_from_header(parts)
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        authenticate(&app_state, token).await.map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SocketUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;

        let token = match bearer_from_header(parts) {
            Some(token) => token.to_string(),
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.token)
                .filter(|token| !token.is_empty())
                .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?,
        };

        authenticate(&app_state, &token).await.map(SocketUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Admin {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

/// Loads the subgroup and checks it belongs to `group_id` and that the user
/// is a member of it. Admins pass without membership (`None` role).
pub(crate) async fn require_subgroup_access(
    state: &AppState,
    user: &User,
    group_id: &str,
    subgroup_id: &str,
) -> Result<(SubGroup, Option<MemberRole>), ApiError> {
    let subgroup = repositories::groups::find_subgroup(state.db(), subgroup_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch subgroup"))?
        .filter(|subgroup| subgroup.group_id == group_id)
        .ok_or_else(|| ApiError::NotFound("Subgroup not found".to_string()))?;

    let role = repositories::groups::find_member_role(state.db(), subgroup_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch subgroup membership"))?;

    if role.is_none() && user.role != UserRole::Admin {
        return Err(ApiError::Forbidden("Membership required for this subgroup"));
    }

    Ok((subgroup, role))
}

pub(crate) async fn load_assignment(state: &AppState, assignment_id: &str) -> Result<Assignment, ApiError> {
    repositories::assignments::find_by_id(state.db(), assignment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assignment"))?
        .ok_or_else(|| ApiError::NotFound("Assignment not found".to_string()))
}

/// Admins, or instructors of the subgroup the assignment belongs to.
pub(crate) async fn require_subgroup_instructor(
    state: &AppState,
    user: &User,
    subgroup_id: &str,
) -> Result<(), ApiError> {
    if user.role == UserRole::Admin {
        return Ok(());
    }

    let role = repositories::groups::find_member_role(state.db(), subgroup_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch subgroup membership"))?;

    if role == Some(MemberRole::Instructor) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Instructor access required for this subgroup"))
    }
}

pub(crate) async fn require_assignment_instructor(
    state: &AppState,
    user: &User,
    assignment_id: &str,
) -> Result<Assignment, ApiError> {
    let assignment = load_assignment(state, assignment_id).await?;
    require_subgroup_instructor(state, user, &assignment.subgroup_id).await?;
    Ok(assignment)
}
