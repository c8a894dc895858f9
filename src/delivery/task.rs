//! Delivery task payloads.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Channel;

/// A fully addressed email, ready for an SMTP relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTask {
    pub to: String,
    pub subject: String,
    /// HTML body
    pub body: String,
    /// Paths of files to attach
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

/// A push message for every token of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushTask {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
}

impl PushTask {
    pub fn new(tokens: Vec<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            tokens,
            title: title.into(),
            body: body.into(),
        }
    }

    /// Same message, restricted to the given tokens
    pub fn with_tokens(&self, tokens: Vec<String>) -> Self {
        Self {
            tokens,
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }
}

/// Unit of work handed to the delivery workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum DeliveryTask {
    Email(EmailTask),
    Push(PushTask),
}

impl DeliveryTask {
    pub fn channel(&self) -> Channel {
        match self {
            DeliveryTask::Email(_) => Channel::Email,
            DeliveryTask::Push(_) => Channel::Push,
        }
    }
}

/// A task as stored on the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTask {
    pub id: Uuid,
    pub task: DeliveryTask,
    /// Attempts already made
    #[serde(default)]
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time a worker may pick the task up; `None` means now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
}

impl QueuedTask {
    pub fn new(task: DeliveryTask) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            attempts: 0,
            enqueued_at: Utc::now(),
            not_before: None,
        }
    }

    /// The task to run on the next attempt, keeping the id and due after `delay`
    pub fn retry_with(&self, task: DeliveryTask, delay: Duration) -> Self {
        let now = Utc::now();
        let delay = TimeDelta::milliseconds(delay.as_millis().min(i64::MAX as u128) as i64);
        Self {
            id: self.id,
            task,
            attempts: self.attempts + 1,
            enqueued_at: now,
            not_before: Some(now + delay),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before.map_or(true, |due| due <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_wire_format_is_tagged() {
        let task = DeliveryTask::Push(PushTask::new(vec!["t1".into()], "Hi", "Body"));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["channel"], "push");
        assert_eq!(json["tokens"][0], "t1");
    }

    #[test]
    fn test_retry_keeps_id_and_counts_attempt() {
        let queued = QueuedTask::new(DeliveryTask::Push(PushTask::new(
            vec!["a".into(), "b".into()],
            "T",
            "B",
        )));
        let DeliveryTask::Push(push) = &queued.task else {
            panic!("expected push task");
        };

        let retry = queued.retry_with(
            DeliveryTask::Push(push.with_tokens(vec!["b".into()])),
            Duration::from_secs(30),
        );

        assert_eq!(retry.id, queued.id);
        assert_eq!(retry.attempts, 1);
        assert_eq!(retry.task.channel(), Channel::Push);
        assert!(queued.is_due(Utc::now()));
        assert!(!retry.is_due(Utc::now()));
        assert!(retry.is_due(Utc::now() + TimeDelta::seconds(31)));
    }

    #[test]
    fn test_due_time_survives_the_wire() {
        let retry = QueuedTask::new(DeliveryTask::Push(PushTask::new(vec!["a".into()], "T", "B")))
            .retry_with(
                DeliveryTask::Push(PushTask::new(vec!["a".into()], "T", "B")),
                Duration::from_secs(5),
            );

        let json = serde_json::to_string(&retry).unwrap();
        let decoded: QueuedTask = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.not_before, retry.not_before);
        assert!(!decoded.is_due(Utc::now()));
    }

    #[test]
    fn test_email_task_defaults_optional_fields() {
        let task: EmailTask = serde_json::from_value(serde_json::json!({
            "to": "a@example.com",
            "subject": "S",
            "body": "B"
        }))
        .unwrap();
        assert!(task.cc.is_empty());
        assert!(task.reply_to.is_none());
    }
}
