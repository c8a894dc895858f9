//! Asynchronous delivery of email and push tasks.
//!
//! The notification core hands fully addressed tasks to a
//! [`DeliveryTaskQueue`]; a pool of [`DeliveryWorker`]s drains the queue and
//! sends through the configured providers with at-least-once semantics.
//!
//! - `backend` / `memory_backend` / `redis_backend`: queue storage
//! - `provider` / `smtp` / `fcm`: transports
//! - `worker`: retrying worker pool

pub mod backend;
pub mod factory;
pub mod fcm;
pub mod memory_backend;
pub mod provider;
pub mod redis_backend;
pub mod smtp;
pub mod task;
pub mod worker;

use std::sync::Arc;

use crate::config::Settings;

pub use backend::{DeliveryTaskQueue, QueueError};
pub use factory::create_task_queue;
pub use fcm::FcmPushProvider;
pub use memory_backend::MemoryTaskQueue;
pub use provider::{DeliveryError, DisabledProvider, EmailProvider, PushProvider};
pub use redis_backend::RedisTaskQueue;
pub use smtp::SmtpEmailProvider;
pub use task::{DeliveryTask, EmailTask, PushTask, QueuedTask};
pub use worker::{spawn_workers, DeliveryWorker, PushReport, TaskOutcome, WorkerConfig};

/// Build the email and push providers from settings.
///
/// A channel without credentials gets a [`DisabledProvider`] that drops its
/// tasks with a warning.
pub fn create_providers(
    settings: &Settings,
) -> Result<(Arc<dyn EmailProvider>, Arc<dyn PushProvider>), DeliveryError> {
    let email: Arc<dyn EmailProvider> = match SmtpEmailProvider::from_config(&settings.smtp)? {
        Some(provider) => Arc::new(provider),
        None => {
            tracing::warn!("SMTP host not configured, email delivery disabled");
            Arc::new(DisabledProvider)
        }
    };

    let push: Arc<dyn PushProvider> = match FcmPushProvider::from_config(&settings.fcm)? {
        Some(provider) => Arc::new(provider),
        None => {
            tracing::warn!("FCM server key not configured, push delivery disabled");
            Arc::new(DisabledProvider)
        }
    };

    Ok((email, push))
}
