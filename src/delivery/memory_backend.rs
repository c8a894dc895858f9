//! In-memory delivery task queue.
//!
//! Tasks live in a single FIFO guarded by a mutex; a `Notify` wakes a waiting
//! worker when a task arrives. Retries carry a due time and stay in the FIFO
//! until it passes, so `pop` skips over them. Pending tasks are lost on
//! restart, so this backend suits development, tests and single-node
//! deployments.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::metrics::DeliveryMetrics;

use super::backend::{DeliveryTaskQueue, QueueError};
use super::task::QueuedTask;

/// In-memory FIFO of delivery tasks
#[derive(Default)]
pub struct MemoryTaskQueue {
    tasks: Mutex<VecDeque<QueuedTask>>,
    notify: Notify,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the waiting tasks, oldest first
    pub async fn pending(&self) -> Vec<QueuedTask> {
        self.tasks.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl DeliveryTaskQueue for MemoryTaskQueue {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn push(&self, task: QueuedTask) -> Result<(), QueueError> {
        let depth = {
            let mut tasks = self.tasks.lock().await;
            tasks.push_back(task);
            tasks.len()
        };
        DeliveryMetrics::set_queue_depth(depth);
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<QueuedTask>, QueueError> {
        let deadline = Instant::now() + timeout;

        loop {
            // Register interest before checking so a concurrent push is not missed
            let notified = self.notify.notified();

            let next_due = {
                let mut tasks = self.tasks.lock().await;
                let now = Utc::now();
                if let Some(index) = tasks.iter().position(|task| task.is_due(now)) {
                    let task = tasks.remove(index);
                    DeliveryMetrics::set_queue_depth(tasks.len());
                    return Ok(task);
                }
                tasks
                    .iter()
                    .filter_map(|task| task.not_before)
                    .min()
                    .map(|due| Instant::now() + (due - now).to_std().unwrap_or_default())
            };

            let wake = next_due.map_or(deadline, |due| due.min(deadline));
            if tokio::time::timeout_at(wake, notified).await.is_err() && wake >= deadline {
                return Ok(None);
            }
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.tasks.lock().await.len())
    }
}
