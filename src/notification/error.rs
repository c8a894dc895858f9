//! Failure taxonomy of the notification pipeline.

use thiserror::Error;

use crate::delivery::QueueError;
use crate::domain::Channel;
use crate::store::StoreError;

/// Errors raised while resolving, gating or dispatching a notification.
///
/// `TemplateNotFound` and `PermissionLookup` are logged and absorbed where
/// they happen; the rest end the send in the `Failed` state.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("{channel} template '{key}' not found")]
    TemplateNotFound { channel: Channel, key: String },

    #[error("No recipient resolved for template '{template}'")]
    RecipientUnresolved { template: String },

    #[error("Permission lookup failed: {0}")]
    PermissionLookup(#[source] StoreError),

    #[error("Directory lookup failed: {0}")]
    DirectoryLookup(#[source] StoreError),

    #[error("Inbox insert failed: {0}")]
    InboxInsert(#[source] StoreError),

    #[error("Failed to enqueue {channel} task: {source}")]
    Enqueue {
        channel: Channel,
        #[source]
        source: QueueError,
    },
}

pub type NotificationResult<T> = Result<T, NotificationError>;
