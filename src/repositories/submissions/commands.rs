use sqlx::PgPool;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

use super::types::{ReviewUpdate, SubmitUpsert, COLUMNS};

/// Creates or overwrites the (assignment, student) row as a fresh submission.
///
/// The write only lands when the stored version still equals
/// `expected_version` (`None` means no row may exist); otherwise `None` is
/// returned and nothing changes.
pub(crate) async fn upsert_submitted(
    executor: impl sqlx::PgExecutor<'_>,
    params: SubmitUpsert<'_>,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO submissions (
            id, assignment_id, student_id, text_content, status, grade, feedback, late,
            submitted_at, approved_at, graded_by, graded_at, version, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,NULL,NULL,$6,$7,NULL,NULL,NULL,1,$7,$7)
        ON CONFLICT (assignment_id, student_id) DO UPDATE SET
            text_content = EXCLUDED.text_content,
            status = EXCLUDED.status,
            grade = NULL,
            feedback = NULL,
            late = EXCLUDED.late,
            submitted_at = EXCLUDED.submitted_at,
            approved_at = NULL,
            graded_by = NULL,
            graded_at = NULL,
            version = submissions.version + 1,
            updated_at = EXCLUDED.updated_at
        WHERE submissions.version = $8
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.assignment_id)
    .bind(params.student_id)
    .bind(params.text_content)
    .bind(SubmissionStatus::Submitted)
    .bind(params.late)
    .bind(params.now)
    .bind(params.expected_version)
    .fetch_optional(executor)
    .await
}

/// Writes an instructor decision if the row is still at `expected_version`.
pub(crate) async fn apply_review(
    pool: &PgPool,
    params: ReviewUpdate<'_>,
) -> Result<Option<Submission>, sqlx::Error> {
    let approved_at = (params.status == SubmissionStatus::Approved).then_some(params.now);

    sqlx::query_as::<_, Submission>(&format!(
        "UPDATE submissions
         SET status = $1,
             grade = $2,
             feedback = $3,
             approved_at = $4,
             graded_by = $5,
             graded_at = $6,
             version = version + 1,
             updated_at = $6
         WHERE assignment_id = $7 AND student_id = $8 AND version = $9
         RETURNING {COLUMNS}"
    ))
    .bind(params.status)
    .bind(params.grade)
    .bind(params.feedback)
    .bind(approved_at)
    .bind(params.graded_by)
    .bind(params.now)
    .bind(params.assignment_id)
    .bind(params.student_id)
    .bind(params.expected_version)
    .fetch_optional(pool)
    .await
}
