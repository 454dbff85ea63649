use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Group, SubGroup, SubGroupMember};
use crate::db::types::MemberRole;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GroupCreate {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubGroupCreate {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberAdd {
    #[serde(alias = "userId")]
    pub(crate) user_id: String,
    pub(crate) role: MemberRole,
}

#[derive(Debug, Serialize)]
pub(crate) struct GroupResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_at: String,
}

impl GroupResponse {
    pub(crate) fn from_db(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
            description: group.description,
            created_at: format_primitive(group.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubGroupResponse {
    pub(crate) id: String,
    pub(crate) group_id: String,
    pub(crate) name: String,
    pub(crate) created_at: String,
}

impl SubGroupResponse {
    pub(crate) fn from_db(subgroup: SubGroup) -> Self {
        Self {
            id: subgroup.id,
            group_id: subgroup.group_id,
            name: subgroup.name,
            created_at: format_primitive(subgroup.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MemberResponse {
    pub(crate) subgroup_id: String,
    pub(crate) user_id: String,
    pub(crate) role: MemberRole,
    pub(crate) joined_at: String,
}

impl MemberResponse {
    pub(crate) fn from_db(member: SubGroupMember) -> Self {
        Self {
            subgroup_id: member.subgroup_id,
            user_id: member.user_id,
            role: member.role,
            joined_at: format_primitive(member.joined_at),
        }
    }
}
