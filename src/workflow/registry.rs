use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock};
use tracing::info;

/// Cancellation handle for one running workflow. Cloned freely; all
/// clones observe the same flag.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub run_id: String,
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
    cancel: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

impl JobHandle {
    fn new(run_id: String, workflow_id: String) -> Self {
        Self {
            run_id,
            workflow_id,
            started_at: Utc::now(),
            cancel: Arc::new(Notify::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a cancel that lands before the
        // run starts waiting is still observed.
        self.cancel.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the job is cancelled. Single waiter: only the
    /// executing run awaits this.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.cancel.notified().await;
    }
}

/// Shared registry of in-flight runs. The executor registers a run
/// before its first step and removes it after the record is final, so
/// `active` always reflects cancellable work.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, run_id: &str, workflow_id: &str) -> JobHandle {
        let handle = JobHandle::new(run_id.to_string(), workflow_id.to_string());
        self.jobs
            .write()
            .await
            .insert(run_id.to_string(), handle.clone());
        handle
    }

    pub async fn finish(&self, run_id: &str) {
        self.jobs.write().await.remove(run_id);
    }

    /// Requests cancellation. Returns false when the run is unknown or
    /// already finished.
    pub async fn cancel(&self, run_id: &str) -> bool {
        match self.jobs.read().await.get(run_id) {
            Some(handle) => {
                info!(run_id, "cancellation requested");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn active(&self) -> Vec<JobHandle> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, run_id: &str) -> bool {
        self.jobs.read().await.contains_key(run_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
