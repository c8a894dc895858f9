//! Notification templates.
//!
//! This module provides:
//! - Email/push template records and their availability rules
//! - The registry mapping template keys to routing and override rules
//! - `{{$macro}}` substitution for rendering template content
//!
//! # Example
//!
//! ```ignore
//! let mut macros = Macros::new();
//! macros.insert("job_title".into(), json!("Welder"));
//!
//! let subject = substitute("Your job {{$job_title}} was renewed", &macros);
//! ```

mod registry;
mod substitution;
mod types;

pub use registry::{AdminList, CcDirective, ResolutionStrategy, TemplateRegistry};
pub use substitution::{macro_text, substitute, Macros};
pub use types::{Channel, NotificationTemplate, PublishState, TemplatePair};
