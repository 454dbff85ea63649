use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{MemberRole, SubmissionStatus, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Group {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SubGroup {
    pub(crate) id: String,
    pub(crate) group_id: String,
    pub(crate) name: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SubGroupMember {
    pub(crate) subgroup_id: String,
    pub(crate) user_id: String,
    pub(crate) role: MemberRole,
    pub(crate) joined_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Resource {
    pub(crate) id: String,
    pub(crate) group_id: String,
    pub(crate) subgroup_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) storage_key: Option<String>,
    pub(crate) filename: Option<String>,
    pub(crate) mime_type: Option<String>,
    pub(crate) file_size: Option<i64>,
    pub(crate) sha256: Option<String>,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assignment {
    pub(crate) id: String,
    pub(crate) group_id: String,
    pub(crate) subgroup_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) deadline: PrimitiveDateTime,
    pub(crate) allow_resubmission: bool,
    pub(crate) allow_late_submission: bool,
    pub(crate) closed_at: Option<PrimitiveDateTime>,
    pub(crate) last_reminder_at: Option<PrimitiveDateTime>,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AssignmentFile {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) filename: String,
    pub(crate) storage_key: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) sha256: String,
    pub(crate) uploaded_by: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) text_content: Option<String>,
    pub(crate) status: SubmissionStatus,
    pub(crate) grade: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) late: bool,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) approved_at: Option<PrimitiveDateTime>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) version: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SubmissionFile {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) position: i32,
    pub(crate) filename: String,
    pub(crate) storage_key: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) sha256: String,
    pub(crate) created_at: PrimitiveDateTime,
}
