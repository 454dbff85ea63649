use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::{broadcast, mpsc};

use crate::api::guards::SocketUser;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::services::notifications::{
    assignment_reminder_topic, submission_approved_topic, NotificationHub, SUBMISSION_APPROVED,
};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const OUTBOUND_BUFFER: usize = 64;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

/// Topics a user listens on: their own approval and reminder topics, plus the
/// global approval feed for staff.
fn topics_for(user: &User) -> Vec<String> {
    let mut topics =
        vec![submission_approved_topic(&user.id), assignment_reminder_topic(&user.id)];
    if user.role.is_staff() {
        topics.push(SUBMISSION_APPROVED.to_string());
    }
    topics
}

async fn upgrade(
    SocketUser(user): SocketUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.notifications().clone();
    ws.on_upgrade(move |socket| serve(socket, hub, user))
}

async fn serve(socket: WebSocket, hub: NotificationHub, user: User) {
    let topics = topics_for(&user);
    let (mut sink, mut stream) = socket.split();

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut background = Vec::with_capacity(topics.len() + 1);
    for topic in &topics {
        let rx = hub.subscribe(topic).await;
        background.push(tokio::spawn(forward(rx, out_tx.clone(), topic.clone())));
    }

    background.push({
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(PING_INTERVAL).await;
                if out_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        })
    });

    tracing::info!(user_id = %user.id, topics = ?topics, "Push channel opened");

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                if is_app_ping(&text) {
                    let _ = out_tx.send(Message::Text(pong_frame())).await;
                } else {
                    tracing::debug!(user_id = %user.id, "Ignoring client message on push channel");
                }
            }
            Message::Ping(payload) => {
                let _ = out_tx.send(Message::Pong(payload)).await;
            }
            Message::Pong(_) | Message::Binary(_) => {}
            Message::Close(_) => break,
        }
    }

    for task in &background {
        task.abort();
    }
    // Awaiting the aborted tasks drops their receivers before pruning.
    for task in background {
        let _ = task.await;
    }
    drop(out_tx);
    let _ = writer.await;

    let pruned = hub.prune(&topics).await;
    if pruned > 0 {
        tracing::debug!(user_id = %user.id, pruned, "Dropped idle push topics");
    }

    tracing::info!(user_id = %user.id, "Push channel closed");
}

async fn forward(mut rx: broadcast::Receiver<String>, out_tx: mpsc::Sender<Message>, topic: String) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                if out_tx.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(topic = %topic, skipped, "Push subscriber lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn is_app_ping(raw: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(raw),
        Ok(Value::Object(map)) if map.get("type").and_then(Value::as_str) == Some("ping")
    )
}

fn pong_frame() -> String {
    serde_json::json!({
        "event": "pong",
        "payload": {},
        "ts": OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::db::types::UserRole;

    fn user(role: UserRole) -> User {
        let now = primitive_now_utc();
        User {
            id: "u-1".to_string(),
            username: "someone".to_string(),
            hashed_password: String::new(),
            full_name: "Some One".to_string(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn students_only_get_personal_topics() {
        assert_eq!(
            topics_for(&user(UserRole::Student)),
            vec!["submissionApproved:u-1", "assignmentReminder:u-1"]
        );
    }

    #[test]
    fn staff_also_get_global_approval_feed() {
        let topics = topics_for(&user(UserRole::Instructor));
        assert!(topics.contains(&"submissionApproved".to_string()));
        assert_eq!(topics.len(), 3);
    }

    #[test]
    fn app_ping_detection() {
        assert!(is_app_ping(r#"{"type":"ping"}"#));
        assert!(!is_app_ping(r#"{"type":"subscribe"}"#));
        assert!(!is_app_ping("ping"));
        let pong: Value = serde_json::from_str(&pong_frame()).unwrap();
        assert_eq!(pong["event"], "pong");
    }
}
