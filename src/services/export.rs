use std::io::{Cursor, Write};

use serde::Serialize;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::services::storage::sanitized_filename;

#[derive(Debug, Error)]
pub(crate) enum ExportError {
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExportedFile {
    pub(crate) archive_path: String,
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) sha256: String,
}

/// Contents of `submission.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionManifest {
    pub(crate) submission_id: String,
    pub(crate) assignment_id: String,
    pub(crate) assignment_title: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) status: String,
    pub(crate) grade: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) late: bool,
    pub(crate) submitted_at: String,
    pub(crate) approved_at: Option<String>,
    pub(crate) version: i64,
    pub(crate) files: Vec<ExportedFile>,
}

pub(crate) struct ExportFile {
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) sha256: String,
    pub(crate) bytes: Vec<u8>,
}

pub(crate) fn archive_name(submission_id: &str) -> String {
    format!("submission-{submission_id}.zip")
}

/// Builds the export archive: `submission.json`, `submission.txt` when there
/// is text, and `files/<n>_<filename>` per attachment.
pub(crate) fn build_archive(
    mut manifest: SubmissionManifest,
    text: Option<&str>,
    files: Vec<ExportFile>,
) -> Result<Vec<u8>, ExportError> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default().unix_permissions(0o644);

        manifest.files.clear();
        for (index, file) in files.iter().enumerate() {
            manifest.files.push(ExportedFile {
                archive_path: format!("files/{}_{}", index + 1, sanitized_filename(&file.filename)),
                filename: file.filename.clone(),
                mime_type: file.mime_type.clone(),
                file_size: file.bytes.len() as i64,
                sha256: file.sha256.clone(),
            });
        }

        zip.start_file("submission.json", options)?;
        zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;

        if let Some(text) = text.filter(|text| !text.is_empty()) {
            zip.start_file("submission.txt", options)?;
            zip.write_all(text.as_bytes())?;
        }

        for (entry, file) in manifest.files.iter().zip(files) {
            zip.start_file(entry.archive_path.as_str(), options)?;
            zip.write_all(&file.bytes)?;
        }

        zip.finish()?;
    }

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn manifest() -> SubmissionManifest {
        SubmissionManifest {
            submission_id: "sub-1".to_string(),
            assignment_id: "asg-1".to_string(),
            assignment_title: "Essay".to_string(),
            student_id: "stu-1".to_string(),
            student_name: "Ada".to_string(),
            status: "graded".to_string(),
            grade: Some(88.0),
            feedback: Some("good".to_string()),
            late: false,
            submitted_at: "2024-01-01T00:00:00Z".to_string(),
            approved_at: None,
            version: 2,
            files: Vec::new(),
        }
    }

    #[test]
    fn archive_contains_metadata_text_and_numbered_files() {
        let files = vec![
            ExportFile {
                filename: "draft 1.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                sha256: "aa".to_string(),
                bytes: b"%PDF".to_vec(),
            },
            ExportFile {
                filename: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
                sha256: "bb".to_string(),
                bytes: b"notes".to_vec(),
            },
        ];

        let bytes = build_archive(manifest(), Some("my answer"), files).expect("archive");
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("read archive");

        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["files/1_draft1.pdf", "files/2_notes.txt", "submission.json", "submission.txt"]
        );

        let mut text = String::new();
        archive.by_name("submission.txt").expect("text entry").read_to_string(&mut text).unwrap();
        assert_eq!(text, "my answer");

        let mut json = String::new();
        archive.by_name("submission.json").expect("json entry").read_to_string(&mut json).unwrap();
        let json: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(json["grade"], 88.0);
        assert_eq!(json["files"][1]["archivePath"], "files/2_notes.txt");
        assert_eq!(json["files"][0]["fileSize"], 4);
    }

    #[test]
    fn archive_without_text_skips_text_entry() {
        let bytes = build_archive(manifest(), None, Vec::new()).expect("archive");
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("read archive");
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names, vec!["submission.json"]);
    }
}
