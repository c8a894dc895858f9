//! In-app inbox entries written alongside push notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::subject::SubjectType;

/// Source recorded on every system-generated inbox entry
pub const SYSTEM_SOURCE: &str = "system bot";

/// Inbox a record is shown in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Individual,
    Organization,
}

impl Destination {
    pub fn for_subject(subject_type: SubjectType) -> Self {
        match subject_type {
            SubjectType::Individual => Destination::Individual,
            SubjectType::OrgScoped(_) => Destination::Organization,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Individual => "individual",
            Destination::Organization => "organization",
        }
    }
}

/// An inbox row to be inserted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInboxRecord {
    pub title: String,
    pub body: String,
    pub source: String,
    pub destination: Destination,
    pub user_id: i64,
    /// Caller reference (job id, invoice id...) for later lookup and dedup
    pub reference_id: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub is_read: bool,
    pub template_id: i64,
    pub template_key: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted inbox row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: NewInboxRecord,
}
