use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::submission_workflow::WorkflowError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn detail(&self) -> String {
        match self {
            ApiError::Unauthorized(message)
            | ApiError::Forbidden(message)
            | ApiError::TooManyRequests(message) => message.to_string(),
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::ServiceUnavailable(message)
            | ApiError::Internal(message) => message.clone(),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::GradeNotNumeric
            | WorkflowError::GradeOutOfRange
            | WorkflowError::EmptySubmission
            | WorkflowError::DeadlinePassed => ApiError::BadRequest(err.to_string()),
            WorkflowError::AssignmentClosed
            | WorkflowError::ResubmissionNotAllowed
            | WorkflowError::VersionConflict { .. } => ApiError::Conflict(err.to_string()),
            WorkflowError::NotAStudentMember => {
                ApiError::Forbidden("Only students of this subgroup can submit")
            }
            WorkflowError::NothingToGrade => ApiError::NotFound(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
            }
            _ => {}
        }

        let mut response =
            (status, Json(ErrorResponse { status: status.as_u16(), detail: self.detail() }))
                .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_http_statuses() {
        let cases = [
            (WorkflowError::GradeOutOfRange, StatusCode::BAD_REQUEST),
            (WorkflowError::DeadlinePassed, StatusCode::BAD_REQUEST),
            (WorkflowError::AssignmentClosed, StatusCode::CONFLICT),
            (WorkflowError::ResubmissionNotAllowed, StatusCode::CONFLICT),
            (WorkflowError::VersionConflict { expected: 1, actual: 2 }, StatusCode::CONFLICT),
            (WorkflowError::NothingToGrade, StatusCode::NOT_FOUND),
            (WorkflowError::NotAStudentMember, StatusCode::FORBIDDEN),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let response = ApiError::Unauthorized("Invalid authentication credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn nothing_to_grade_keeps_message() {
        assert_eq!(ApiError::from(WorkflowError::NothingToGrade).detail(), "No submission to grade");
    }
}
