//! Notification core: recipient resolution, permission gating and dispatch.
//!
//! A [`NotificationRequest`] flows through the [`NotificationOrchestrator`]:
//!
//! 1. Email and push templates are loaded for the template key
//! 2. [`RecipientResolver`] picks the primary and escalation recipients
//! 3. [`PermissionGate`] decides which channels are allowed
//! 4. [`ChannelDispatcher`] renders content and enqueues delivery tasks
//!
//! All per-send state lives in a [`SendContext`] built for that request.

pub mod address_book;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod resolver;

pub use address_book::AddressBook;
pub use context::{NotificationRequest, SendContext};
pub use dispatcher::{ChannelDispatcher, PushDispatch};
pub use error::{NotificationError, NotificationResult};
pub use gate::PermissionGate;
pub use orchestrator::{NotificationOrchestrator, NotificationReport, OrchestrationState};
pub use resolver::{RecipientResolver, RecipientSet};
