//! Request-scoped values threaded through one notification pass.

use serde::{Deserialize, Serialize};

use crate::domain::template::{macro_text, Macros};
use crate::domain::{SubjectRef, SubjectType, TemplatePair};

/// Macro carrying the caller's reference id
const REFERENCE_ID_MACRO: &str = "reference_id";
/// Misspelled key still sent by older callers
const LEGACY_REFERENCE_ID_MACRO: &str = "refrence_id";
/// Macro carrying the inbox payload
const PAYLOAD_MACRO: &str = "payload";

/// A request to notify a subject using a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub subject_type: SubjectType,
    pub subject_id: SubjectRef,
    #[serde(alias = "template")]
    pub template_key: String,
    #[serde(default)]
    pub macros: Macros,
    /// Broadcast-style notice copied to the management lists
    #[serde(default)]
    pub to_admin: bool,
    /// Path of a file to attach to the email
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

impl NotificationRequest {
    pub fn new(
        subject_type: SubjectType,
        subject_id: impl Into<SubjectRef>,
        template_key: impl Into<String>,
    ) -> Self {
        Self {
            subject_type,
            subject_id: subject_id.into(),
            template_key: template_key.into(),
            macros: Macros::new(),
            to_admin: false,
            attachment: None,
            reply_to: None,
        }
    }

    pub fn with_macro(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.macros.insert(key.into(), value.into());
        self
    }

    pub fn with_macros(mut self, macros: Macros) -> Self {
        self.macros = macros;
        self
    }

    pub fn to_admin(mut self, to_admin: bool) -> Self {
        self.to_admin = to_admin;
        self
    }

    pub fn with_attachment(mut self, path: impl Into<String>) -> Self {
        self.attachment = Some(path.into());
        self
    }

    pub fn with_reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Caller reference for the inbox row, accepting the legacy macro name
    pub fn reference_id(&self) -> Option<String> {
        self.macros
            .get(REFERENCE_ID_MACRO)
            .or_else(|| self.macros.get(LEGACY_REFERENCE_ID_MACRO))
            .filter(|value| !value.is_null())
            .map(macro_text)
    }

    /// Extra data stored on the inbox row
    pub fn payload(&self) -> Option<serde_json::Value> {
        self.macros
            .get(PAYLOAD_MACRO)
            .filter(|value| !value.is_null())
            .cloned()
    }
}

/// Everything known about one send once its templates are loaded.
///
/// Built fresh for every request and passed by reference to the resolver,
/// gate and dispatcher; nothing from one send outlives it.
#[derive(Debug, Clone)]
pub struct SendContext {
    pub request: NotificationRequest,
    pub templates: TemplatePair,
}

impl SendContext {
    pub fn new(request: NotificationRequest, templates: TemplatePair) -> Self {
        Self { request, templates }
    }

    pub fn template_key(&self) -> &str {
        &self.request.template_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> NotificationRequest {
        NotificationRequest::new(SubjectType::Individual, 7, "Welcome")
    }

    #[test]
    fn test_reference_id_prefers_current_name() {
        let req = request()
            .with_macro("reference_id", "job-1")
            .with_macro("refrence_id", "job-2");
        assert_eq!(req.reference_id().as_deref(), Some("job-1"));
    }

    #[test]
    fn test_reference_id_falls_back_to_legacy_name() {
        let req = request().with_macro("refrence_id", 42);
        assert_eq!(req.reference_id().as_deref(), Some("42"));
    }

    #[test]
    fn test_payload_and_missing_reference() {
        let req = request().with_macro("payload", json!({"job_id": 3}));
        assert!(req.reference_id().is_none());
        assert_eq!(req.payload(), Some(json!({"job_id": 3})));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: NotificationRequest = serde_json::from_value(json!({
            "subject_type": "member",
            "subject_id": 12,
            "template_key": "TransactionInvoice"
        }))
        .unwrap();

        assert!(req.subject_type.is_org_scoped());
        assert_eq!(req.subject_id, SubjectRef::Numeric(12));
        assert!(req.macros.is_empty());
        assert!(!req.to_admin);
    }
}
