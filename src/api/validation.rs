use crate::api::errors::ApiError;
use crate::core::config::Settings;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
const MAX_FILENAME_LEN: usize = 255;

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    let valid = (3..=64).contains(&username.len())
        && username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Username must be 3-64 characters of letters, digits, '.', '_' or '-'".to_string(),
        ))
    }
}

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

/// Per-file checks applied while a multipart body is read.
pub(crate) fn validate_upload(
    filename: &str,
    size: usize,
    settings: &Settings,
) -> Result<(), ApiError> {
    if filename.trim().is_empty() {
        return Err(ApiError::BadRequest("File must have a name".to_string()));
    }
    if filename.len() > MAX_FILENAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "File name must be at most {MAX_FILENAME_LEN} bytes"
        )));
    }
    if size == 0 {
        return Err(ApiError::BadRequest(format!("File '{filename}' is empty")));
    }

    let max_bytes = settings.storage().max_upload_bytes();
    if size as u64 > max_bytes {
        return Err(ApiError::BadRequest(format!(
            "File '{filename}' exceeds the {} MB limit",
            settings.storage().max_upload_size_mb
        )));
    }

    Ok(())
}

pub(crate) fn validate_file_count(count: usize, settings: &Settings) -> Result<(), ApiError> {
    let max = settings.storage().max_files_per_submission;
    if count as u64 > max {
        Err(ApiError::BadRequest(format!("At most {max} files can be attached")))
    } else {
        Ok(())
    }
}
