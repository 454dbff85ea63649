use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::SubmissionFile;

const COLUMNS: &str = "\
    id, submission_id, assignment_id, student_id, position, filename, storage_key, \
    mime_type, file_size, sha256, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<SubmissionFile>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionFile>(&format!(
        "SELECT {COLUMNS} FROM submission_files WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_submission(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
) -> Result<Vec<SubmissionFile>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionFile>(&format!(
        "SELECT {COLUMNS} FROM submission_files WHERE submission_id = $1 ORDER BY position"
    ))
    .bind(submission_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_by_assignment(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Vec<SubmissionFile>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionFile>(&format!(
        "SELECT {COLUMNS} FROM submission_files
         WHERE assignment_id = $1
         ORDER BY student_id, position"
    ))
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct NewSubmissionFile {
    pub(crate) id: String,
    pub(crate) filename: String,
    pub(crate) storage_key: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) sha256: String,
}

/// Swaps the attachment set of a submission. Returns the storage keys of the
/// rows that were removed so the caller can delete the blobs after commit.
pub(crate) async fn replace_for_submission(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    submission_id: &str,
    assignment_id: &str,
    student_id: &str,
    files: &[NewSubmissionFile],
    now: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    let removed: Vec<String> = sqlx::query_scalar(
        "DELETE FROM submission_files WHERE submission_id = $1 RETURNING storage_key",
    )
    .bind(submission_id)
    .fetch_all(&mut **tx)
    .await?;

    for (position, file) in files.iter().enumerate() {
        sqlx::query(
            "INSERT INTO submission_files (
                id, submission_id, assignment_id, student_id, position, filename,
                storage_key, mime_type, file_size, sha256, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
        )
        .bind(&file.id)
        .bind(submission_id)
        .bind(assignment_id)
        .bind(student_id)
        .bind(position as i32)
        .bind(&file.filename)
        .bind(&file.storage_key)
        .bind(&file.mime_type)
        .bind(file.file_size)
        .bind(&file.sha256)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    Ok(removed)
}
