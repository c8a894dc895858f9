//! Delivery worker pool.
//!
//! Each worker pops tasks from the shared queue and runs them through the
//! email or push provider. Failed tasks are pushed straight back onto the
//! queue, due after an exponential backoff delay, until `max_attempts` is
//! reached. Push batches isolate
//! failures per token: only the tokens that failed with a retryable error
//! are re-queued.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::backoff::{BackoffConfig, ExponentialBackoff};
use crate::config::QueueConfig;
use crate::domain::Channel;
use crate::metrics::DeliveryMetrics;

use super::backend::DeliveryTaskQueue;
use super::provider::{DeliveryError, EmailProvider, PushProvider};
use super::task::{DeliveryTask, EmailTask, PushTask, QueuedTask};

/// Pause after a queue error before polling again
const QUEUE_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// What happened to a task after one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every recipient was reached
    Delivered,
    /// Some or all recipients failed and a retry was scheduled
    Retrying { attempt: u32, delay: Duration },
    /// Failed permanently or ran out of attempts
    Dropped,
}

/// Per-token results of one push batch
#[derive(Debug, Default)]
pub struct PushReport {
    pub delivered: usize,
    /// Tokens worth another attempt
    pub retryable: Vec<String>,
    pub rejected: usize,
}

/// Worker settings shared by the pool
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_attempts: u32,
    pub poll_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl From<&QueueConfig> for WorkerConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds.max(1)),
            backoff: BackoffConfig::from(config),
        }
    }
}

/// A single delivery worker
pub struct DeliveryWorker {
    id: usize,
    queue: Arc<dyn DeliveryTaskQueue>,
    email: Arc<dyn EmailProvider>,
    push: Arc<dyn PushProvider>,
    config: WorkerConfig,
    backoff: ExponentialBackoff,
}

impl DeliveryWorker {
    pub fn new(
        id: usize,
        queue: Arc<dyn DeliveryTaskQueue>,
        email: Arc<dyn EmailProvider>,
        push: Arc<dyn PushProvider>,
        config: WorkerConfig,
    ) -> Self {
        let backoff = ExponentialBackoff::with_config(config.backoff.clone());
        Self {
            id,
            queue,
            email,
            push,
            config,
            backoff,
        }
    }

    /// Pop and process tasks until shutdown is signalled
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            worker_id = self.id,
            backend = self.queue.backend_name(),
            email_provider = self.email.name(),
            push_provider = self.push.name(),
            "Delivery worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(worker_id = self.id, "Delivery worker received shutdown signal");
                    break;
                }
                popped = self.queue.pop(self.config.poll_timeout) => {
                    match popped {
                        Ok(Some(task)) => {
                            self.process(task).await;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(worker_id = self.id, error = %e, "Failed to pop delivery task");
                            tokio::time::sleep(QUEUE_ERROR_PAUSE).await;
                        }
                    }
                }
            }
        }

        tracing::info!(worker_id = self.id, "Delivery worker stopped");
    }

    /// Run one attempt of a task and schedule a retry if needed
    #[tracing::instrument(
        name = "delivery.process",
        skip(self, queued),
        fields(worker_id = self.id, task_id = %queued.id, attempt = queued.attempts + 1)
    )]
    pub async fn process(&self, queued: QueuedTask) -> TaskOutcome {
        match &queued.task {
            DeliveryTask::Email(task) => match self.deliver_email(task).await {
                Ok(()) => TaskOutcome::Delivered,
                Err(e) if e.is_retryable() => {
                    self.schedule_retry(&queued, queued.task.clone(), &e).await
                }
                Err(e) => {
                    tracing::error!(to = %task.to, error = %e, "Email delivery failed permanently");
                    TaskOutcome::Dropped
                }
            },
            DeliveryTask::Push(task) => {
                let report = self.deliver_push(task).await;
                if report.retryable.is_empty() {
                    if report.delivered == 0 && report.rejected > 0 {
                        TaskOutcome::Dropped
                    } else {
                        TaskOutcome::Delivered
                    }
                } else {
                    let retry = DeliveryTask::Push(task.with_tokens(report.retryable));
                    let reason = DeliveryError::Rejected("push tokens failed".to_string());
                    self.schedule_retry(&queued, retry, &reason).await
                }
            }
        }
    }

    async fn deliver_email(&self, task: &EmailTask) -> Result<(), DeliveryError> {
        let result = self.email.send(task).await;
        let label = if result.is_ok() { "success" } else { "failure" };
        DeliveryMetrics::record_attempt(Channel::Email, label);
        result
    }

    /// Send to every token concurrently; one token failing does not stop the rest
    pub async fn deliver_push(&self, task: &PushTask) -> PushReport {
        let mut sends: FuturesUnordered<_> = task
            .tokens
            .iter()
            .map(|token| async move {
                let result = self.push.send(token, &task.title, &task.body).await;
                (token, result)
            })
            .collect();

        let mut report = PushReport::default();
        while let Some((token, result)) = sends.next().await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) if e.is_retryable() => {
                    tracing::warn!(error = %e, "Push to device failed, will retry");
                    report.retryable.push(token.clone());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Push to device rejected");
                    report.rejected += 1;
                }
            }
        }

        let failed = report.retryable.len() + report.rejected;
        DeliveryMetrics::record_push_tokens(report.delivered as u64, failed as u64);
        DeliveryMetrics::record_attempt(
            Channel::Push,
            if failed == 0 { "success" } else { "failure" },
        );

        tracing::debug!(
            delivered = report.delivered,
            retryable = report.retryable.len(),
            rejected = report.rejected,
            "Push batch processed"
        );

        report
    }

    async fn schedule_retry(
        &self,
        queued: &QueuedTask,
        task: DeliveryTask,
        error: &DeliveryError,
    ) -> TaskOutcome {
        let attempt = queued.attempts + 1;
        if attempt >= self.config.max_attempts {
            tracing::error!(
                task_id = %queued.id,
                attempts = attempt,
                error = %error,
                "Delivery task exhausted its attempts, dropping"
            );
            return TaskOutcome::Dropped;
        }

        let delay = self.backoff.delay_for(attempt);
        let retry = queued.retry_with(task, delay);

        if let Err(e) = self.queue.push(retry).await {
            tracing::error!(
                task_id = %queued.id,
                error = %e,
                "Failed to re-queue delivery task, dropping"
            );
            return TaskOutcome::Dropped;
        }

        tracing::warn!(
            task_id = %queued.id,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Delivery failed, scheduling retry"
        );

        TaskOutcome::Retrying { attempt, delay }
    }
}

/// Spawn `worker_concurrency` workers sharing one queue and provider set
pub fn spawn_workers(
    settings: &QueueConfig,
    queue: Arc<dyn DeliveryTaskQueue>,
    email: Arc<dyn EmailProvider>,
    push: Arc<dyn PushProvider>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let config = WorkerConfig::from(settings);
    let count = settings.worker_concurrency.max(1);

    tracing::info!(
        workers = count,
        max_attempts = config.max_attempts,
        "Starting delivery workers"
    );

    (0..count)
        .map(|id| {
            let worker = DeliveryWorker::new(
                id,
                queue.clone(),
                email.clone(),
                push.clone(),
                config.clone(),
            );
            tokio::spawn(worker.run(shutdown_tx.subscribe()))
        })
        .collect()
}
