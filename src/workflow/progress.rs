use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{LogEntry, RunStatus};

const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Snapshot of a run's progress, published after every log append and at
/// every status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunUpdate {
    pub run_id: String,
    pub status: RunStatus,
    pub logs: Vec<LogEntry>,
}

/// Fan-out channel for run progress. Publishing is best-effort: a run
/// never fails or blocks because nobody is listening or a subscriber
/// lagged behind.
#[derive(Debug, Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<RunUpdate>,
}

impl ProgressBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunUpdate> {
        self.tx.subscribe()
    }

    pub fn publish(&self, update: RunUpdate) {
        if self.tx.send(update).is_err() {
            debug!("no progress subscribers; update dropped");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: RunStatus) -> RunUpdate {
        RunUpdate {
            run_id: "run-1".to_string(),
            status,
            logs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_updates() {
        let bus = ProgressBus::new();
        let mut rx = bus.subscribe();

        bus.publish(update(RunStatus::Running));
        bus.publish(update(RunStatus::Completed));

        assert_eq!(rx.recv().await.unwrap().status, RunStatus::Running);
        assert_eq!(rx.recv().await.unwrap().status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_no_op() {
        let bus = ProgressBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(update(RunStatus::Running));
    }

    #[tokio::test]
    async fn each_subscriber_gets_its_own_copy() {
        let bus = ProgressBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(update(RunStatus::Failed));
        assert_eq!(a.recv().await.unwrap().status, RunStatus::Failed);
        assert_eq!(b.recv().await.unwrap().status, RunStatus::Failed);
    }
}
