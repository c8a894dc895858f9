//! Template types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery medium of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Push => "push",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publication state of a template record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum PublishState {
    #[default]
    Draft,
    Published,
}

/// An email or push template record, loaded read-only per send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    /// Storage id, referenced by permission records and inbox entries
    pub id: i64,

    /// Template key (e.g. "TransactionInvoice")
    pub key: String,

    pub channel: Channel,

    /// Email subject or push title, may contain `{{$macro}}` placeholders
    pub title: String,

    /// Email HTML body or push message text
    #[serde(default)]
    pub body: String,

    /// Whether users may opt out of this template
    #[serde(default)]
    pub editable_by_user: bool,

    /// Operator switch for this template's channel
    #[serde(default = "default_true")]
    pub globally_enabled: bool,

    #[serde(default)]
    pub publish_state: PublishState,
}

fn default_true() -> bool {
    true
}

impl NotificationTemplate {
    pub fn new(id: i64, key: impl Into<String>, channel: Channel) -> Self {
        Self {
            id,
            key: key.into(),
            channel,
            title: String::new(),
            body: String::new(),
            editable_by_user: false,
            globally_enabled: true,
            publish_state: PublishState::Published,
        }
    }

    pub fn with_content(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.title = title.into();
        self.body = body.into();
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable_by_user = editable;
        self
    }

    pub fn globally_enabled(mut self, enabled: bool) -> Self {
        self.globally_enabled = enabled;
        self
    }

    pub fn with_publish_state(mut self, state: PublishState) -> Self {
        self.publish_state = state;
        self
    }

    /// True when the operator switch is on and the record is published
    pub fn is_available(&self) -> bool {
        self.globally_enabled && self.publish_state == PublishState::Published
    }
}

/// Email and push templates loaded for one send
#[derive(Debug, Clone, Default)]
pub struct TemplatePair {
    pub email: Option<NotificationTemplate>,
    pub push: Option<NotificationTemplate>,
}

impl TemplatePair {
    pub fn get(&self, channel: Channel) -> Option<&NotificationTemplate> {
        match channel {
            Channel::Email => self.email.as_ref(),
            Channel::Push => self.push.as_ref(),
        }
    }
}
