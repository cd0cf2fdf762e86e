//! Job event broadcaster for live status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::job::{Job, JobId, Stage};

/// Emitted every time a job's status record changes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    pub stage: Stage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl JobEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            stage: job.stage,
            message: job.message.clone(),
            timestamp: job.updated_at,
            error: job.error.clone(),
            record_id: job.artifacts.record_id.clone(),
        }
    }
}

/// Fan-out of [`JobEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let broadcaster = JobEventBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        let job = Job::queued(JobId::new(), "jpg");
        broadcaster.send(JobEvent::from_job(&job));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id, job.id);
        assert_eq!(event.stage, Stage::Queued);
        assert!(event.error.is_none());
    }

    #[test]
    fn test_send_without_subscribers_is_silent() {
        let broadcaster = JobEventBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);
        broadcaster.send(JobEvent::from_job(&Job::queued(JobId::new(), "png")));
    }
}
