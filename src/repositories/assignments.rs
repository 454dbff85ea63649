use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Assignment;
use crate::db::types::SubmissionStatus;

pub(crate) const COLUMNS: &str = "\
    a.id, a.group_id, a.subgroup_id, a.title, a.description, a.deadline, \
    a.allow_resubmission, a.allow_late_submission, a.closed_at, a.last_reminder_at, \
    a.created_by, a.created_at, a.updated_at";

const RETURNING: &str = "\
    id, group_id, subgroup_id, title, description, deadline, allow_resubmission, \
    allow_late_submission, closed_at, last_reminder_at, created_by, created_at, updated_at";

/// An assignment together with one student's submission summary, if any.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct AssignmentForStudent {
    #[sqlx(flatten)]
    pub(crate) assignment: Assignment,
    pub(crate) submission_status: Option<SubmissionStatus>,
    pub(crate) submission_grade: Option<f64>,
    pub(crate) submission_version: Option<i64>,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!("SELECT {COLUMNS} FROM assignments a WHERE a.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_subgroup(
    pool: &PgPool,
    group_id: &str,
    subgroup_id: &str,
) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM assignments a
         WHERE a.group_id = $1 AND a.subgroup_id = $2
         ORDER BY a.deadline, a.id"
    ))
    .bind(group_id)
    .bind(subgroup_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_for_student(
    pool: &PgPool,
    group_id: &str,
    subgroup_id: &str,
    student_id: &str,
) -> Result<Vec<AssignmentForStudent>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentForStudent>(&format!(
        "SELECT {COLUMNS},
                s.status AS submission_status,
                s.grade AS submission_grade,
                s.version AS submission_version
         FROM assignments a
         LEFT JOIN submissions s ON s.assignment_id = a.id AND s.student_id = $3
         WHERE a.group_id = $1 AND a.subgroup_id = $2
         ORDER BY a.deadline, a.id"
    ))
    .bind(group_id)
    .bind(subgroup_id)
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateAssignment<'a> {
    pub(crate) id: &'a str,
    pub(crate) group_id: &'a str,
    pub(crate) subgroup_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) deadline: PrimitiveDateTime,
    pub(crate) allow_resubmission: bool,
    pub(crate) allow_late_submission: bool,
    pub(crate) created_by: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateAssignment<'_>) -> Result<Assignment, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "INSERT INTO assignments (
            id, group_id, subgroup_id, title, description, deadline,
            allow_resubmission, allow_late_submission, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$10)
        RETURNING {RETURNING}"
    ))
    .bind(params.id)
    .bind(params.group_id)
    .bind(params.subgroup_id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.deadline)
    .bind(params.allow_resubmission)
    .bind(params.allow_late_submission)
    .bind(params.created_by)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

/// Stamps `closed_at` unless it is already set and returns the stored row.
pub(crate) async fn close(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "UPDATE assignments
         SET closed_at = COALESCE(closed_at, $2),
             updated_at = CASE WHEN closed_at IS NULL THEN $2 ELSE updated_at END
         WHERE id = $1
         RETURNING {RETURNING}"
    ))
    .bind(id)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn stamp_reminder(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE assignments SET last_reminder_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

/// Closes open assignments whose deadline passed and that refuse late work.
pub(crate) async fn close_overdue(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "UPDATE assignments
         SET closed_at = $1, updated_at = $1
         WHERE closed_at IS NULL AND allow_late_submission = FALSE AND deadline < $1
         RETURNING id",
    )
    .bind(now)
    .fetch_all(pool)
    .await
}
