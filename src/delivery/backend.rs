//! Delivery task queue backend trait.
//!
//! The notification core only enqueues; the worker pool pops. Both sides talk
//! to the same `DeliveryTaskQueue` so the storage backend can be swapped
//! without touching either.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Channel;
use crate::metrics::DeliveryMetrics;

use super::task::{DeliveryTask, EmailTask, PushTask, QueuedTask};

/// Errors that can occur in queue backends.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Task could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Queue is shutting down or otherwise unavailable
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

/// At-least-once task queue shared by dispatchers and workers.
#[async_trait]
pub trait DeliveryTaskQueue: Send + Sync {
    /// Backend name for logs and health output
    fn backend_name(&self) -> &'static str;

    /// Append a task to the queue
    async fn push(&self, task: QueuedTask) -> Result<(), QueueError>;

    /// Take the oldest task, waiting up to `timeout` for one to arrive
    async fn pop(&self, timeout: Duration) -> Result<Option<QueuedTask>, QueueError>;

    /// Number of tasks waiting
    async fn len(&self) -> Result<usize, QueueError>;

    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    /// Enqueue an email send
    async fn enqueue_email(&self, task: EmailTask) -> Result<Uuid, QueueError> {
        enqueue(self, DeliveryTask::Email(task)).await
    }

    /// Enqueue a push send for a batch of device tokens
    async fn enqueue_push(&self, task: PushTask) -> Result<Uuid, QueueError> {
        enqueue(self, DeliveryTask::Push(task)).await
    }
}

async fn enqueue<Q: DeliveryTaskQueue + ?Sized>(
    queue: &Q,
    task: DeliveryTask,
) -> Result<Uuid, QueueError> {
    let channel: Channel = task.channel();
    let queued = QueuedTask::new(task);
    let id = queued.id;

    match queue.push(queued).await {
        Ok(()) => {
            DeliveryMetrics::record_enqueued(channel);
            tracing::debug!(
                task_id = %id,
                channel = %channel,
                backend = queue.backend_name(),
                "Delivery task enqueued"
            );
            Ok(id)
        }
        Err(e) => {
            DeliveryMetrics::record_enqueue_failed(channel);
            tracing::error!(
                channel = %channel,
                backend = queue.backend_name(),
                error = %e,
                "Failed to enqueue delivery task"
            );
            Err(e)
        }
    }
}
