use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::AssignmentFile;

const COLUMNS: &str = "\
    id, assignment_id, filename, storage_key, mime_type, file_size, sha256, uploaded_by, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<AssignmentFile>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentFile>(&format!(
        "SELECT {COLUMNS} FROM assignment_files WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_assignment(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Vec<AssignmentFile>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentFile>(&format!(
        "SELECT {COLUMNS} FROM assignment_files WHERE assignment_id = $1 ORDER BY created_at, id"
    ))
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}

/// Attachments of several assignments at once, ordered per assignment.
pub(crate) async fn list_by_assignments(
    pool: &PgPool,
    assignment_ids: &[String],
) -> Result<Vec<AssignmentFile>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentFile>(&format!(
        "SELECT {COLUMNS} FROM assignment_files
         WHERE assignment_id = ANY($1)
         ORDER BY assignment_id, created_at, id"
    ))
    .bind(assignment_ids)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateAssignmentFile<'a> {
    pub(crate) id: &'a str,
    pub(crate) assignment_id: &'a str,
    pub(crate) filename: &'a str,
    pub(crate) storage_key: &'a str,
    pub(crate) mime_type: &'a str,
    pub(crate) file_size: i64,
    pub(crate) sha256: &'a str,
    pub(crate) uploaded_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateAssignmentFile<'_>,
) -> Result<AssignmentFile, sqlx::Error> {
    sqlx::query_as::<_, AssignmentFile>(&format!(
        "INSERT INTO assignment_files (
            id, assignment_id, filename, storage_key, mime_type, file_size, sha256, uploaded_by, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.assignment_id)
    .bind(params.filename)
    .bind(params.storage_key)
    .bind(params.mime_type)
    .bind(params.file_size)
    .bind(params.sha256)
    .bind(params.uploaded_by)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}
