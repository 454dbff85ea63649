//! Typed HTTP client for the coursework API together with the client-side
//! state rules: explicit auth context, keyed reconciliation of submission
//! listings and push events, and periodic polling.

mod poller;
mod reconcile;

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::services::submission_workflow::check_grade;

pub use poller::{SubmissionPoller, DEFAULT_POLL_INTERVAL};
pub use reconcile::{ApplyOutcome, Keyed, KeyedCollection, MergeStats};

const DEFAULT_API_PREFIX: &str = "/api";
const SUBMISSION_APPROVED_EVENT: &str = "submissionApproved";

/// Where to talk to and as whom. Passed to every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub base_url: String,
    pub token: Option<String>,
}

impl AuthContext {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self { base_url: base_url.into(), token }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    InvalidGrade(String),
    #[error("Not authenticated: {0}")]
    Unauthorized(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    NotSubmitted,
    Submitted,
    Approved,
    Graded,
    Rejected,
}

/// Status an instructor can set when grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Approved,
    #[default]
    Graded,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub sha256: String,
}

/// One student of an assignment listing, with or without a submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterEntry {
    pub student_id: String,
    pub student_username: String,
    pub student_name: String,
    pub submission_id: Option<String>,
    pub status: SubmissionState,
    pub text: Option<String>,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub late: bool,
    pub submitted_at: Option<String>,
    pub approved_at: Option<String>,
    pub graded_at: Option<String>,
    pub version: i64,
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

impl Keyed for RosterEntry {
    fn key(&self) -> &str {
        &self.student_id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub status: SubmissionState,
    pub text: Option<String>,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub late: bool,
    pub submitted_at: String,
    pub approved_at: Option<String>,
    pub graded_by: Option<String>,
    pub graded_at: Option<String>,
    pub version: i64,
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeInput {
    pub grade: f64,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

impl GradeInput {
    pub fn new(grade: f64, status: ReviewStatus) -> Self {
        Self { grade, status, feedback: None, expected_version: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkGradeInput {
    pub student_ids: Vec<String>,
    pub grade: f64,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulkGradeFailure {
    pub student_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulkGradeOutcome {
    pub status: SubmissionState,
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkGradeFailure>,
}

/// Payload of a `submissionApproved` push frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEvent {
    pub assignment_id: String,
    pub student_id: String,
    pub status: SubmissionState,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub approved_at: Option<String>,
    pub version: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub ts: Option<String>,
}

/// Applies a submission event to a listing through the version check.
/// Events for other assignments, or for students not in the listing, leave
/// it untouched.
pub fn apply_submission_event(
    collection: &mut KeyedCollection<RosterEntry>,
    assignment_id: &str,
    event: &SubmissionEvent,
) -> ApplyOutcome {
    if event.assignment_id != assignment_id {
        return ApplyOutcome::Missing;
    }
    collection.update_with(&event.student_id, event.version, |entry| {
        entry.status = event.status;
        entry.grade = event.grade;
        entry.feedback = event.feedback.clone();
        entry.approved_at = event.approved_at.clone();
        entry.version = event.version;
    })
}

/// Decodes a raw push frame; `None` for anything that is not a submission
/// approval (pongs, reminders).
pub fn parse_submission_event(raw: &str) -> Result<Option<SubmissionEvent>, ClientError> {
    let frame: PushFrame = serde_json::from_str(raw)?;
    if frame.event != SUBMISSION_APPROVED_EVENT {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(frame.payload)?))
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    api_prefix: String,
}

impl ApiClient {
    pub fn new() -> Result<Self, ClientError> {
        Self::with_prefix(DEFAULT_API_PREFIX)
    }

    pub fn with_prefix(api_prefix: &str) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        let api_prefix = format!("/{}", api_prefix.trim_matches('/'));
        Ok(Self { http, api_prefix: api_prefix.trim_end_matches('/').to_string() })
    }

    fn request(&self, method: Method, auth: &AuthContext, path: &str) -> RequestBuilder {
        let url = format!("{}{}{}", auth.base_url.trim_end_matches('/'), self.api_prefix, path);
        let builder = self.http.request(method, url);
        match &auth.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn list_submissions(
        &self,
        auth: &AuthContext,
        assignment_id: &str,
    ) -> Result<Vec<RosterEntry>, ClientError> {
        let response = self
            .request(Method::GET, auth, &format!("/assignments/{assignment_id}/submissions"))
            .send()
            .await?;
        read_json(response).await
    }

    /// Grades one submission. The grade is checked before anything is sent.
    pub async fn grade(
        &self,
        auth: &AuthContext,
        assignment_id: &str,
        student_id: &str,
        input: &GradeInput,
    ) -> Result<Submission, ClientError> {
        check_grade(input.grade).map_err(|err| ClientError::InvalidGrade(err.to_string()))?;

        let response = self
            .request(
                Method::PATCH,
                auth,
                &format!("/assignments/{assignment_id}/submissions/{student_id}"),
            )
            .json(input)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn bulk_grade(
        &self,
        auth: &AuthContext,
        assignment_id: &str,
        input: &BulkGradeInput,
    ) -> Result<BulkGradeOutcome, ClientError> {
        check_grade(input.grade).map_err(|err| ClientError::InvalidGrade(err.to_string()))?;

        let response = self
            .request(
                Method::POST,
                auth,
                &format!("/assignments/{assignment_id}/submissions/bulk-grade"),
            )
            .json(input)
            .send()
            .await?;
        let outcome: BulkGradeOutcome = read_json(response).await?;

        if !outcome.failed.is_empty() {
            tracing::warn!(
                assignment_id = %assignment_id,
                succeeded = outcome.succeeded.len(),
                failed = outcome.failed.len(),
                "Bulk grading partially failed"
            );
        }
        Ok(outcome)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let raw = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|body| body.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(raw);

    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(detail),
        StatusCode::CONFLICT => ClientError::Conflict(detail),
        _ => ClientError::Api { status: status.as_u16(), detail },
    })
}

#[cfg(test)]
mod tests;
