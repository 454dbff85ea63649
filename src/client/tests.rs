use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Duration;

use super::*;

#[derive(Clone, Default)]
struct Stub {
    failing: Arc<AtomicBool>,
    version: Arc<AtomicUsize>,
    grade_calls: Arc<AtomicUsize>,
}

fn roster_row(student_id: &str, status: &str, version: u64) -> Value {
    let submission_id =
        if version == 0 { Value::Null } else { json!(format!("sub-{student_id}")) };
    json!({
        "student_id": student_id,
        "student_username": student_id,
        "student_name": format!("Student {student_id}"),
        "submission_id": submission_id,
        "status": status,
        "text": null,
        "grade": null,
        "feedback": null,
        "late": false,
        "submitted_at": null,
        "approved_at": null,
        "graded_at": null,
        "version": version,
        "files": []
    })
}

fn unauthenticated(headers: &HeaderMap) -> Option<Response> {
    if headers.contains_key("authorization") {
        return None;
    }
    Some(
        (StatusCode::UNAUTHORIZED, Json(json!({"status": 401, "detail": "Not authenticated"})))
            .into_response(),
    )
}

async fn list(
    Path(_assignment_id): Path<String>,
    headers: HeaderMap,
    State(stub): State<Stub>,
) -> Response {
    if let Some(denied) = unauthenticated(&headers) {
        return denied;
    }
    if stub.failing.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": 500, "detail": "boom"})))
            .into_response();
    }
    let version = stub.version.load(Ordering::SeqCst) as u64;
    Json(json!([roster_row("s-1", "submitted", version), roster_row("s-2", "not_submitted", 0)]))
        .into_response()
}

async fn grade(
    Path((assignment_id, student_id)): Path<(String, String)>,
    State(stub): State<Stub>,
    Json(body): Json<Value>,
) -> Response {
    stub.grade_calls.fetch_add(1, Ordering::SeqCst);
    if body["expected_version"] == json!(99) {
        return (StatusCode::CONFLICT, Json(json!({"status": 409, "detail": "stale version"})))
            .into_response();
    }
    Json(json!({
        "id": "sub-1",
        "assignment_id": assignment_id,
        "student_id": student_id,
        "status": body["status"],
        "text": "answer",
        "grade": body["grade"],
        "feedback": body.get("feedback").cloned().unwrap_or(Value::Null),
        "late": false,
        "submitted_at": "2026-01-01T00:00:00Z",
        "approved_at": null,
        "graded_by": "inst-1",
        "graded_at": "2026-01-02T00:00:00Z",
        "version": 2,
        "files": []
    }))
    .into_response()
}

async fn bulk(Path(_assignment_id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let ids: Vec<String> = serde_json::from_value(body["student_ids"].clone()).unwrap_or_default();
    let (succeeded, failed): (Vec<_>, Vec<_>) = ids.into_iter().partition(|id| id != "ghost");
    Json(json!({
        "status": body["status"],
        "succeeded": succeeded,
        "failed": failed
            .into_iter()
            .map(|id| json!({"student_id": id, "reason": "No submission to grade"}))
            .collect::<Vec<_>>()
    }))
}

async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/api/assignments/:assignment_id/submissions", get(list))
        .route("/api/assignments/:assignment_id/submissions/bulk-grade", post(bulk))
        .route("/api/assignments/:assignment_id/submissions/:student_id", patch(grade))
        .with_state(stub);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });
    format!("http://{addr}")
}

fn auth(base_url: &str) -> AuthContext {
    AuthContext::new(base_url, Some("token".to_string()))
}

#[tokio::test]
async fn list_submissions_decodes_roster() {
    let stub = Stub::default();
    stub.version.store(1, Ordering::SeqCst);
    let base = spawn_stub(stub).await;
    let client = ApiClient::new().expect("client");

    let roster = client.list_submissions(&auth(&base), "a-1").await.expect("roster");

    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].status, SubmissionState::Submitted);
    assert_eq!(roster[0].submission_id.as_deref(), Some("sub-s-1"));
    assert_eq!(roster[1].status, SubmissionState::NotSubmitted);
    assert_eq!(roster[1].version, 0);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let base = spawn_stub(Stub::default()).await;
    let client = ApiClient::new().expect("client");

    let err = client
        .list_submissions(&AuthContext::new(base, None), "a-1")
        .await
        .expect_err("no token");

    assert!(matches!(err, ClientError::Unauthorized(detail) if detail == "Not authenticated"));
}

#[tokio::test]
async fn invalid_grade_is_refused_before_any_request() {
    let client = ApiClient::new().expect("client");
    // Nothing listens on port 1; reaching the network would yield Http.
    let nowhere = auth("http://127.0.0.1:1");

    for bad in [101.0, -0.5, f64::NAN] {
        let err = client
            .grade(&nowhere, "a-1", "s-1", &GradeInput::new(bad, ReviewStatus::Graded))
            .await
            .expect_err("invalid grade");
        assert!(matches!(err, ClientError::InvalidGrade(_)), "got {err:?}");
    }

    let input = BulkGradeInput {
        student_ids: vec!["s-1".to_string()],
        grade: 150.0,
        status: ReviewStatus::Approved,
        feedback: None,
    };
    let err = client.bulk_grade(&nowhere, "a-1", &input).await.expect_err("invalid bulk grade");
    assert_eq!(err.to_string(), "Grade must be between 0 and 100");
}

#[tokio::test]
async fn grade_sends_review_and_maps_conflict() {
    let stub = Stub::default();
    let base = spawn_stub(stub.clone()).await;
    let client = ApiClient::new().expect("client");

    let mut input = GradeInput::new(88.5, ReviewStatus::Approved);
    input.feedback = Some("nice".to_string());
    let graded = client.grade(&auth(&base), "a-1", "s-1", &input).await.expect("graded");
    assert_eq!(graded.status, SubmissionState::Approved);
    assert_eq!(graded.grade, Some(88.5));
    assert_eq!(graded.feedback.as_deref(), Some("nice"));

    input.expected_version = Some(99);
    let err = client.grade(&auth(&base), "a-1", "s-1", &input).await.expect_err("conflict");
    assert!(matches!(err, ClientError::Conflict(_)));
    assert_eq!(stub.grade_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn bulk_grade_surfaces_partial_failures() {
    let base = spawn_stub(Stub::default()).await;
    let client = ApiClient::new().expect("client");
    let input = BulkGradeInput {
        student_ids: vec!["s-1".to_string(), "ghost".to_string()],
        grade: 70.0,
        status: ReviewStatus::Graded,
        feedback: None,
    };

    let outcome = client.bulk_grade(&auth(&base), "a-1", &input).await.expect("bulk");

    assert_eq!(outcome.status, SubmissionState::Graded);
    assert_eq!(outcome.succeeded, vec!["s-1".to_string()]);
    assert_eq!(
        outcome.failed,
        vec![BulkGradeFailure {
            student_id: "ghost".to_string(),
            reason: "No submission to grade".to_string()
        }]
    );
}

#[tokio::test]
async fn failed_poll_keeps_previous_listing() {
    let stub = Stub::default();
    stub.version.store(1, Ordering::SeqCst);
    let base = spawn_stub(stub.clone()).await;
    let poller = SubmissionPoller::new(ApiClient::new().expect("client"), auth(&base), "a-1");

    let stats = poller.poll_once().await.expect("first poll");
    assert_eq!(stats.inserted, 2);

    stub.failing.store(true, Ordering::SeqCst);
    let err = poller.poll_once().await.expect_err("failing poll");
    assert!(matches!(err, ClientError::Api { status: 500, .. }));

    let collection = poller.collection();
    let held = collection.read().await;
    assert_eq!(held.len(), 2);
    assert_eq!(held.get("s-1").map(|entry| entry.version), Some(1));
}

#[tokio::test]
async fn push_event_beats_older_poll() {
    let stub = Stub::default();
    stub.version.store(1, Ordering::SeqCst);
    let base = spawn_stub(stub.clone()).await;
    let poller = SubmissionPoller::new(ApiClient::new().expect("client"), auth(&base), "a-1");
    poller.poll_once().await.expect("first poll");

    let frame = json!({
        "event": "submissionApproved",
        "topic": "submissionApproved",
        "payload": {
            "assignmentId": "a-1",
            "studentId": "s-1",
            "status": "approved",
            "grade": 95.0,
            "feedback": "great",
            "approvedAt": "2026-01-03T00:00:00Z",
            "version": 3
        },
        "ts": "2026-01-03T00:00:00Z"
    })
    .to_string();
    let event = parse_submission_event(&frame).expect("frame").expect("approval event");
    assert_eq!(poller.apply_event(&event).await, ApplyOutcome::Replaced);

    // The server listing still reports version 2 from before the approval.
    stub.version.store(2, Ordering::SeqCst);
    let stats = poller.poll_once().await.expect("second poll");
    assert_eq!(stats.stale, 1);

    let collection = poller.collection();
    let held = collection.read().await;
    let entry = held.get("s-1").expect("entry");
    assert_eq!(entry.status, SubmissionState::Approved);
    assert_eq!(entry.version, 3);
    assert_eq!(entry.grade, Some(95.0));
}

#[tokio::test]
async fn run_stops_on_shutdown_after_polling() {
    let stub = Stub::default();
    stub.version.store(1, Ordering::SeqCst);
    let base = spawn_stub(stub).await;
    let poller = SubmissionPoller::new(ApiClient::new().expect("client"), auth(&base), "a-1")
        .with_interval(Duration::from_millis(20));
    let collection = poller.collection();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(poller.run(shutdown_rx));
    for _ in 0..50 {
        if !collection.read().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(collection.read().await.len(), 2);

    shutdown_tx.send(true).expect("signal");
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller stopped")
        .expect("join");
}

#[test]
fn non_approval_frames_are_ignored() {
    let pong = r#"{"event":"pong","payload":{},"ts":"2026-01-01T00:00:00Z"}"#;
    assert!(parse_submission_event(pong).expect("pong").is_none());
    assert!(matches!(parse_submission_event("not json"), Err(ClientError::Decode(_))));
}

#[test]
fn events_for_other_assignments_do_not_touch_listing() {
    let mut collection = KeyedCollection::new();
    let entry: RosterEntry =
        serde_json::from_value(roster_row("s-1", "submitted", 1)).expect("row");
    collection.apply(entry);

    let event = SubmissionEvent {
        assignment_id: "other".to_string(),
        student_id: "s-1".to_string(),
        status: SubmissionState::Approved,
        grade: Some(50.0),
        feedback: None,
        approved_at: None,
        version: 5,
    };

    assert_eq!(apply_submission_event(&mut collection, "a-1", &event), ApplyOutcome::Missing);
    assert_eq!(collection.get("s-1").map(|entry| entry.version), Some(1));
}
