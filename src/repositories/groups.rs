use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Group, SubGroup, SubGroupMember};
use crate::db::types::MemberRole;

const GROUP_COLUMNS: &str = "g.id, g.name, g.description, g.created_by, g.created_at, g.updated_at";
const SUBGROUP_COLUMNS: &str = "s.id, s.group_id, s.name, s.created_at, s.updated_at";

pub(crate) async fn find_group(pool: &PgPool, id: &str) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!("SELECT {GROUP_COLUMNS} FROM groups g WHERE g.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_subgroup(pool: &PgPool, id: &str) -> Result<Option<SubGroup>, sqlx::Error> {
    sqlx::query_as::<_, SubGroup>(&format!(
        "SELECT {SUBGROUP_COLUMNS} FROM subgroups s WHERE s.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_all_groups(pool: &PgPool) -> Result<Vec<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!("SELECT {GROUP_COLUMNS} FROM groups g ORDER BY g.name, g.id"))
        .fetch_all(pool)
        .await
}

/// Groups in which the user belongs to at least one subgroup.
pub(crate) async fn list_groups_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!(
        "SELECT {GROUP_COLUMNS} FROM groups g
         WHERE EXISTS (
            SELECT 1 FROM subgroups s
            JOIN subgroup_members m ON m.subgroup_id = s.id
            WHERE s.group_id = g.id AND m.user_id = $1
         )
         ORDER BY g.name, g.id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_subgroups(pool: &PgPool, group_id: &str) -> Result<Vec<SubGroup>, sqlx::Error> {
    sqlx::query_as::<_, SubGroup>(&format!(
        "SELECT {SUBGROUP_COLUMNS} FROM subgroups s WHERE s.group_id = $1 ORDER BY s.name, s.id"
    ))
    .bind(group_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_subgroups_for_user(
    pool: &PgPool,
    group_id: &str,
    user_id: &str,
) -> Result<Vec<SubGroup>, sqlx::Error> {
    sqlx::query_as::<_, SubGroup>(&format!(
        "SELECT {SUBGROUP_COLUMNS} FROM subgroups s
         JOIN subgroup_members m ON m.subgroup_id = s.id
         WHERE s.group_id = $1 AND m.user_id = $2
         ORDER BY s.name, s.id"
    ))
    .bind(group_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_member_role(
    pool: &PgPool,
    subgroup_id: &str,
    user_id: &str,
) -> Result<Option<MemberRole>, sqlx::Error> {
    sqlx::query_scalar::<_, MemberRole>(
        "SELECT role FROM subgroup_members WHERE subgroup_id = $1 AND user_id = $2",
    )
    .bind(subgroup_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateGroup<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) created_by: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create_group(pool: &PgPool, params: CreateGroup<'_>) -> Result<Group, sqlx::Error> {
    sqlx::query_as::<_, Group>(
        "INSERT INTO groups (id, name, description, created_by, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$5)
         RETURNING id, name, description, created_by, created_at, updated_at",
    )
    .bind(params.id)
    .bind(params.name)
    .bind(params.description)
    .bind(params.created_by)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn create_subgroup(
    pool: &PgPool,
    id: &str,
    group_id: &str,
    name: &str,
    now: PrimitiveDateTime,
) -> Result<SubGroup, sqlx::Error> {
    sqlx::query_as::<_, SubGroup>(
        "INSERT INTO subgroups (id, group_id, name, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$4)
         RETURNING id, group_id, name, created_at, updated_at",
    )
    .bind(id)
    .bind(group_id)
    .bind(name)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Adds the user to the subgroup or updates the role of an existing membership.
pub(crate) async fn upsert_member(
    pool: &PgPool,
    subgroup_id: &str,
    user_id: &str,
    role: MemberRole,
    now: PrimitiveDateTime,
) -> Result<SubGroupMember, sqlx::Error> {
    sqlx::query_as::<_, SubGroupMember>(
        "INSERT INTO subgroup_members (subgroup_id, user_id, role, joined_at)
         VALUES ($1,$2,$3,$4)
         ON CONFLICT (subgroup_id, user_id) DO UPDATE SET role = EXCLUDED.role
         RETURNING subgroup_id, user_id, role, joined_at",
    )
    .bind(subgroup_id)
    .bind(user_id)
    .bind(role)
    .bind(now)
    .fetch_one(pool)
    .await
}
