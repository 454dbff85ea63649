//! Topic based push channel.
//!
//! One `broadcast` channel per topic, created lazily on first subscription and
//! dropped once a publish or a disconnecting socket finds no receivers left.
//! Publishers never wait on subscribers; a subscriber that falls behind loses
//! the oldest messages.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::{broadcast, RwLock};

use crate::core::time::format_primitive;
use crate::db::models::{Assignment, Submission};
use crate::db::types::SubmissionStatus;

// broadcast rounds capacities up to a power of two.
const TOPIC_CAPACITY: usize = 128;

pub(crate) const SUBMISSION_APPROVED: &str = "submissionApproved";
pub(crate) const ASSIGNMENT_REMINDER: &str = "assignmentReminder";

pub(crate) fn submission_approved_topic(student_id: &str) -> String {
    format!("{SUBMISSION_APPROVED}:{student_id}")
}

pub(crate) fn assignment_reminder_topic(student_id: &str) -> String {
    format!("{ASSIGNMENT_REMINDER}:{student_id}")
}

/// Snapshot of a submission after a change, carrying its version so
/// receivers can discard stale updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionEvent {
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) grade: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) approved_at: Option<String>,
    pub(crate) version: i64,
}

impl From<&Submission> for SubmissionEvent {
    fn from(submission: &Submission) -> Self {
        Self {
            assignment_id: submission.assignment_id.clone(),
            student_id: submission.student_id.clone(),
            status: submission.status,
            grade: submission.grade,
            feedback: submission.feedback.clone(),
            approved_at: submission.approved_at.map(format_primitive),
            version: submission.version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReminderEvent {
    pub(crate) assignment_id: String,
    pub(crate) title: String,
    pub(crate) deadline: String,
}

impl From<&Assignment> for ReminderEvent {
    fn from(assignment: &Assignment) -> Self {
        Self {
            assignment_id: assignment.id.clone(),
            title: assignment.title.clone(),
            deadline: format_primitive(assignment.deadline),
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a, T> {
    event: &'a str,
    topic: &'a str,
    payload: &'a T,
    ts: String,
}

#[derive(Clone, Default)]
pub(crate) struct NotificationHub {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
}

impl NotificationHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Sends a raw frame to `topic`; returns how many subscribers received it.
    pub(crate) async fn broadcast(&self, topic: &str, message: String) -> usize {
        let mut topics = self.topics.write().await;
        let Some(sender) = topics.get(topic) else {
            return 0;
        };

        let delivered = sender.send(message).unwrap_or(0);
        if sender.receiver_count() == 0 {
            tracing::debug!(topic, "Removing topic without subscribers");
            topics.remove(topic);
        }
        delivered
    }

    /// Drops the given topics that no longer have any receiver.
    pub(crate) async fn prune(&self, names: &[String]) -> usize {
        let mut topics = self.topics.write().await;
        let before = topics.len();
        for name in names {
            if topics.get(name).is_some_and(|sender| sender.receiver_count() == 0) {
                topics.remove(name);
            }
        }
        before - topics.len()
    }

    /// Wraps `payload` in the `{event, topic, payload, ts}` envelope and broadcasts it.
    pub(crate) async fn publish<T: Serialize>(&self, event: &str, topic: &str, payload: &T) -> usize {
        let envelope = Envelope {
            event,
            topic,
            payload,
            ts: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        };

        match serde_json::to_string(&envelope) {
            Ok(frame) => self.broadcast(topic, frame).await,
            Err(err) => {
                tracing::error!(error = %err, topic, "Failed to encode push event");
                0
            }
        }
    }

    /// Emits both the per-student and the global approval event.
    pub(crate) async fn submission_approved(&self, event: &SubmissionEvent) {
        let student_topic = submission_approved_topic(&event.student_id);
        let to_student = self.publish(SUBMISSION_APPROVED, &student_topic, event).await;
        let to_staff = self.publish(SUBMISSION_APPROVED, SUBMISSION_APPROVED, event).await;

        tracing::info!(
            assignment_id = %event.assignment_id,
            student_id = %event.student_id,
            to_student,
            to_staff,
            "Published submission approval"
        );
    }

    pub(crate) async fn assignment_reminder(&self, student_id: &str, event: &ReminderEvent) -> usize {
        self.publish(ASSIGNMENT_REMINDER, &assignment_reminder_topic(student_id), event).await
    }

    #[cfg(test)]
    pub(crate) async fn has_topic(&self, topic: &str) -> bool {
        self.topics.read().await.contains_key(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn approved_event() -> SubmissionEvent {
        SubmissionEvent {
            assignment_id: "asg-1".to_string(),
            student_id: "stu-1".to_string(),
            status: SubmissionStatus::Approved,
            grade: Some(95.0),
            feedback: Some("well done".to_string()),
            approved_at: Some("2024-01-01T00:00:00Z".to_string()),
            version: 4,
        }
    }

    async fn next_json(rx: &mut broadcast::Receiver<String>) -> serde_json::Value {
        let frame = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("frame in time")
            .expect("open channel");
        serde_json::from_str(&frame).expect("json frame")
    }

    #[tokio::test]
    async fn approval_reaches_student_and_global_topics() {
        let hub = NotificationHub::new();
        let mut student = hub.subscribe("submissionApproved:stu-1").await;
        let mut other_student = hub.subscribe("submissionApproved:stu-2").await;
        let mut staff = hub.subscribe(SUBMISSION_APPROVED).await;

        hub.submission_approved(&approved_event()).await;

        let frame = next_json(&mut student).await;
        assert_eq!(frame["event"], "submissionApproved");
        assert_eq!(frame["topic"], "submissionApproved:stu-1");
        assert_eq!(frame["payload"]["version"], 4);
        assert_eq!(frame["payload"]["status"], "approved");

        let frame = next_json(&mut staff).await;
        assert_eq!(frame["topic"], "submissionApproved");
        assert_eq!(frame["payload"]["studentId"], "stu-1");

        assert!(other_student.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_no_op() {
        let hub = NotificationHub::new();
        assert_eq!(hub.broadcast("nobody", "hello".to_string()).await, 0);
        assert!(!hub.has_topic("nobody").await);
    }

    #[tokio::test]
    async fn topic_is_dropped_once_last_subscriber_leaves() {
        let hub = NotificationHub::new();
        drop(hub.subscribe("ephemeral").await);
        assert!(hub.has_topic("ephemeral").await);

        hub.broadcast("ephemeral", "cleanup".to_string()).await;
        assert!(!hub.has_topic("ephemeral").await);
    }

    #[tokio::test]
    async fn prune_drops_only_abandoned_topics() {
        let hub = NotificationHub::new();
        drop(hub.subscribe("left").await);
        let _kept = hub.subscribe("stayed").await;

        let names = vec!["left".to_string(), "stayed".to_string(), "unknown".to_string()];
        assert_eq!(hub.prune(&names).await, 1);
        assert!(!hub.has_topic("left").await);
        assert!(hub.has_topic("stayed").await);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking_publisher() {
        let hub = NotificationHub::new();
        let mut slow = hub.subscribe("busy").await;

        for index in 0..(TOPIC_CAPACITY + 10) {
            hub.broadcast("busy", index.to_string()).await;
        }

        assert!(TOPIC_CAPACITY.is_power_of_two());
        assert!(matches!(slow.recv().await, Err(broadcast::error::RecvError::Lagged(10))));
        assert_eq!(slow.recv().await.expect("oldest retained"), "10");
    }

    #[tokio::test]
    async fn reminder_uses_per_student_topic() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe("assignmentReminder:stu-9").await;
        let event = ReminderEvent {
            assignment_id: "asg-2".to_string(),
            title: "Lab 2".to_string(),
            deadline: "2024-02-01T00:00:00Z".to_string(),
        };

        assert_eq!(hub.assignment_reminder("stu-9", &event).await, 1);
        let frame = next_json(&mut rx).await;
        assert_eq!(frame["payload"]["title"], "Lab 2");
    }
}
