use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::Resource;

#[derive(Debug, Serialize)]
pub(crate) struct ResourceFileResponse {
    pub(crate) id: String,
    pub(crate) filename: String,
    pub(crate) mime_type: Option<String>,
    pub(crate) file_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResourceResponse {
    pub(crate) id: String,
    pub(crate) group_id: String,
    pub(crate) subgroup_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) file: Option<ResourceFileResponse>,
    pub(crate) created_at: String,
}

impl ResourceResponse {
    /// The resource id doubles as the download id of its file.
    pub(crate) fn from_db(resource: Resource) -> Self {
        let file = resource.filename.map(|filename| ResourceFileResponse {
            id: resource.id.clone(),
            filename,
            mime_type: resource.mime_type,
            file_size: resource.file_size,
        });

        Self {
            id: resource.id,
            group_id: resource.group_id,
            subgroup_id: resource.subgroup_id,
            title: resource.title,
            description: resource.description,
            file,
            created_at: format_primitive(resource.created_at),
        }
    }
}
