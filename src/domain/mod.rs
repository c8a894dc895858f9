//! Domain layer modules
//!
//! This module contains the notification domain model:
//! - `subject`: Accounts, organizations and their identities
//! - `template`: Template records, key registry and macro substitution
//! - `permission`: Per-user channel switches and gate decisions
//! - `inbox`: In-app inbox entries written for push sends

pub mod inbox;
pub mod permission;
pub mod subject;
pub mod template;

pub use inbox::{Destination, InboxRecord, NewInboxRecord, SYSTEM_SOURCE};
pub use permission::{ChannelDecision, PermissionRecord};
pub use subject::{OrgRole, Organization, Subject, SubjectRef, SubjectType};
pub use template::{Channel, NotificationTemplate, PublishState, TemplatePair};
