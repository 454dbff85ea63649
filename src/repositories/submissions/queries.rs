use sqlx::PgPool;

use crate::db::models::Submission;
use crate::db::types::MemberRole;

use super::types::{RosterRow, COLUMNS};

pub(crate) async fn find(
    executor: impl sqlx::PgExecutor<'_>,
    assignment_id: &str,
    student_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions WHERE assignment_id = $1 AND student_id = $2"
    ))
    .bind(assignment_id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

/// Every student member of the subgroup plus anyone who already submitted,
/// each with their submission columns (all `NULL` when nothing was submitted).
pub(crate) async fn list_roster(
    pool: &PgPool,
    assignment_id: &str,
    subgroup_id: &str,
) -> Result<Vec<RosterRow>, sqlx::Error> {
    sqlx::query_as::<_, RosterRow>(
        "WITH roster AS (
            SELECT m.user_id FROM subgroup_members m
            WHERE m.subgroup_id = $2 AND m.role = $3
            UNION
            SELECT student_id FROM submissions WHERE assignment_id = $1
        )
        SELECT u.id AS student_id,
               u.username,
               u.full_name,
               s.id AS submission_id,
               s.status,
               s.grade,
               s.feedback,
               s.late,
               s.text_content,
               s.submitted_at,
               s.approved_at,
               s.graded_at,
               s.version
        FROM roster r
        JOIN users u ON u.id = r.user_id
        LEFT JOIN submissions s ON s.assignment_id = $1 AND s.student_id = u.id
        ORDER BY u.full_name, u.id",
    )
    .bind(assignment_id)
    .bind(subgroup_id)
    .bind(MemberRole::Student)
    .fetch_all(pool)
    .await
}
