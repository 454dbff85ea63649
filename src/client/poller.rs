use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::{
    apply_submission_event, ApiClient, ApplyOutcome, AuthContext, ClientError, KeyedCollection,
    MergeStats, RosterEntry, SubmissionEvent,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Keeps a shared submission listing for one assignment fresh by polling
/// it and folding in push events.
#[derive(Debug, Clone)]
pub struct SubmissionPoller {
    client: ApiClient,
    auth: AuthContext,
    assignment_id: String,
    period: Duration,
    collection: Arc<RwLock<KeyedCollection<RosterEntry>>>,
}

impl SubmissionPoller {
    pub fn new(client: ApiClient, auth: AuthContext, assignment_id: impl Into<String>) -> Self {
        Self {
            client,
            auth,
            assignment_id: assignment_id.into(),
            period: DEFAULT_POLL_INTERVAL,
            collection: Arc::new(RwLock::new(KeyedCollection::new())),
        }
    }

    pub fn with_interval(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn collection(&self) -> Arc<RwLock<KeyedCollection<RosterEntry>>> {
        Arc::clone(&self.collection)
    }

    /// Fetches the listing and merges it. On error nothing is touched.
    pub async fn poll_once(&self) -> Result<MergeStats, ClientError> {
        let listing = self.client.list_submissions(&self.auth, &self.assignment_id).await?;
        let stats = self.collection.write().await.merge_all(listing);
        tracing::debug!(
            assignment_id = %self.assignment_id,
            inserted = stats.inserted,
            replaced = stats.replaced,
            stale = stats.stale,
            removed = stats.removed,
            "Submission listing merged"
        );
        Ok(stats)
    }

    pub async fn apply_event(&self, event: &SubmissionEvent) -> ApplyOutcome {
        let outcome =
            apply_submission_event(&mut *self.collection.write().await, &self.assignment_id, event);
        if outcome == ApplyOutcome::Stale {
            tracing::debug!(
                student_id = %event.student_id,
                version = event.version,
                "Discarded stale submission event"
            );
        }
        outcome
    }

    /// Polls until `shutdown` flips. Failed polls are logged and the held
    /// listing is kept.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    if let Err(err) = self.poll_once().await {
                        tracing::warn!(
                            assignment_id = %self.assignment_id,
                            error = %err,
                            "Submission poll failed; keeping previous listing"
                        );
                    }
                }
            }
        }
    }
}
