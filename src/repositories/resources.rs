use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Resource;

const COLUMNS: &str = "\
    id, group_id, subgroup_id, title, description, storage_key, filename, mime_type, \
    file_size, sha256, created_by, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Resource>, sqlx::Error> {
    sqlx::query_as::<_, Resource>(&format!("SELECT {COLUMNS} FROM resources WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_subgroup(
    pool: &PgPool,
    group_id: &str,
    subgroup_id: &str,
) -> Result<Vec<Resource>, sqlx::Error> {
    sqlx::query_as::<_, Resource>(&format!(
        "SELECT {COLUMNS} FROM resources
         WHERE group_id = $1 AND subgroup_id = $2
         ORDER BY created_at DESC, id"
    ))
    .bind(group_id)
    .bind(subgroup_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct StoredBlob<'a> {
    pub(crate) storage_key: &'a str,
    pub(crate) filename: &'a str,
    pub(crate) mime_type: &'a str,
    pub(crate) file_size: i64,
    pub(crate) sha256: &'a str,
}

pub(crate) struct CreateResource<'a> {
    pub(crate) id: &'a str,
    pub(crate) group_id: &'a str,
    pub(crate) subgroup_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) file: Option<StoredBlob<'a>>,
    pub(crate) created_by: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateResource<'_>) -> Result<Resource, sqlx::Error> {
    let file = params.file.as_ref();
    sqlx::query_as::<_, Resource>(&format!(
        "INSERT INTO resources (
            id, group_id, subgroup_id, title, description, storage_key, filename, mime_type,
            file_size, sha256, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$12)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.group_id)
    .bind(params.subgroup_id)
    .bind(params.title)
    .bind(params.description)
    .bind(file.map(|blob| blob.storage_key))
    .bind(file.map(|blob| blob.filename))
    .bind(file.map(|blob| blob.mime_type))
    .bind(file.map(|blob| blob.file_size))
    .bind(file.map(|blob| blob.sha256))
    .bind(params.created_by)
    .bind(params.now)
    .fetch_one(pool)
    .await
}
