use std::collections::HashMap;

use axum::extract::Multipart;
use futures::future::try_join_all;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::validation::{validate_file_count, validate_upload};
use crate::core::config::Settings;
use crate::services::storage::{sanitized_filename, StorageService};

#[derive(Debug)]
pub(crate) struct UploadedFile {
    pub(crate) filename: String,
    pub(crate) content_type: String,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct MultipartForm {
    pub(crate) texts: HashMap<String, String>,
    pub(crate) files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// Trimmed text field, `None` when absent or blank.
    pub(crate) fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(|value| value.trim()).filter(|value| !value.is_empty())
    }
}

/// A blob written to object storage, ready to be recorded in the database.
#[derive(Debug, Clone)]
pub(crate) struct StoredUpload {
    pub(crate) id: String,
    pub(crate) filename: String,
    pub(crate) storage_key: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) sha256: String,
}

/// Reads every field of the body. Parts carrying a file name are files and
/// are checked against the upload limits while streaming; the rest are text.
pub(crate) async fn read_form(
    multipart: &mut Multipart,
    settings: &Settings,
) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm::default();
    let max_bytes = settings.storage().max_upload_bytes();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        let Some(filename) = field.file_name().map(str::to_string) else {
            let text = field
                .text()
                .await
                .map_err(|_| ApiError::BadRequest(format!("Invalid value for field '{name}'")))?;
            form.texts.insert(name, text);
            continue;
        };

        validate_file_count(form.files.len() + 1, settings)?;
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
        {
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(ApiError::BadRequest(format!(
                    "File '{filename}' exceeds the {} MB limit",
                    settings.storage().max_upload_size_mb
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        validate_upload(&filename, bytes.len(), settings)?;
        form.files.push(UploadedFile { filename, content_type, bytes });
    }

    Ok(form)
}

pub(crate) fn require_storage(storage: Option<&StorageService>) -> Result<&StorageService, ApiError> {
    storage.ok_or_else(|| {
        ApiError::ServiceUnavailable("File storage is not configured".to_string())
    })
}

/// Uploads all files under `prefix`. On failure the objects already written
/// are removed again.
pub(crate) async fn store_files(
    storage: &StorageService,
    prefix: &str,
    files: Vec<UploadedFile>,
) -> Result<Vec<StoredUpload>, ApiError> {
    let uploads = files.into_iter().map(|file| {
        let id = Uuid::new_v4().to_string();
        let storage_key = format!("{prefix}/{id}_{}", sanitized_filename(&file.filename));
        async move {
            let stored = storage.upload_bytes(&storage_key, &file.content_type, file.bytes).await;
            (id, file.filename, file.content_type, storage_key, stored)
        }
    });

    let results = futures::future::join_all(uploads).await;

    let mut stored = Vec::with_capacity(results.len());
    let mut failure = None;
    for (id, filename, mime_type, storage_key, result) in results {
        match result {
            Ok(object) => stored.push(StoredUpload {
                id,
                filename,
                storage_key,
                mime_type,
                file_size: object.file_size,
                sha256: object.sha256,
            }),
            Err(err) => failure = Some(err),
        }
    }

    if let Some(err) = failure {
        discard(storage, stored.iter().map(|upload| upload.storage_key.clone()).collect()).await;
        return Err(ApiError::internal(err, "Failed to upload file to storage"));
    }

    Ok(stored)
}

/// Best-effort removal of blobs that are no longer referenced.
pub(crate) async fn discard(storage: &StorageService, keys: Vec<String>) {
    let deletions = keys.iter().map(|key| async move {
        if let Err(err) = storage.delete_object(key).await {
            tracing::warn!(error = %err, storage_key = %key, "Failed to delete stored object");
        }
        Ok::<(), ()>(())
    });
    let _ = try_join_all(deletions).await;
}
