//! Per-channel permission decisions.
//!
//! Rules are applied in order and the first one that matches decides:
//!
//! 1. Exceptional templates: email on, push off, regardless of anything else
//! 2. Permission-bypass templates: on
//! 3. No stored switch: on only for templates users cannot opt out of
//! 4. Stored switch: on only when the account-wide channel opt-in, the
//!    template's availability and the switch itself all agree
//!
//! Email and push are evaluated independently from the same inputs.

use std::sync::Arc;

use crate::domain::template::TemplateRegistry;
use crate::domain::{Channel, ChannelDecision, NotificationTemplate, PermissionRecord, Subject};
use crate::metrics::PipelineMetrics;
use crate::store::PermissionStore;

use super::context::SendContext;
use super::error::NotificationError;

/// Decides which channels a send may use
pub struct PermissionGate {
    registry: Arc<TemplateRegistry>,
    permissions: Arc<dyn PermissionStore>,
}

impl PermissionGate {
    pub fn new(registry: Arc<TemplateRegistry>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self {
            registry,
            permissions,
        }
    }

    /// Whether `channel` is permitted for `subject` under this template
    pub async fn is_channel_enabled(
        &self,
        subject: &Subject,
        template_key: &str,
        template: Option<&NotificationTemplate>,
        channel: Channel,
    ) -> bool {
        if self.registry.is_exceptional(template_key) {
            return channel == Channel::Email;
        }

        if self.registry.bypasses_permission(template_key) {
            return true;
        }

        let Some(template) = template else {
            tracing::debug!(
                template = %template_key,
                channel = %channel,
                "No template for channel, channel disabled"
            );
            return false;
        };

        match self.lookup_permission(subject, template, channel).await {
            None => !template.editable_by_user && template.is_available(),
            Some(record) => {
                let opted_in = self.lookup_opt_in(subject, channel).await;
                opted_in && template.is_available() && record.explicitly_enabled
            }
        }
    }

    /// Gate both channels for the resolved primary recipient
    pub async fn evaluate(&self, subject: &Subject, ctx: &SendContext) -> ChannelDecision {
        let key = ctx.template_key();
        let email = self
            .is_channel_enabled(subject, key, ctx.templates.get(Channel::Email), Channel::Email)
            .await;
        let push = self
            .is_channel_enabled(subject, key, ctx.templates.get(Channel::Push), Channel::Push)
            .await;

        PipelineMetrics::record_gate(Channel::Email, email);
        PipelineMetrics::record_gate(Channel::Push, push);

        tracing::debug!(
            template = %key,
            subject_id = %subject.id,
            email = email,
            push = push,
            "Channel gate evaluated"
        );

        ChannelDecision::new(email, push)
    }

    /// Stored switch for a numeric account; failures count as "no record"
    async fn lookup_permission(
        &self,
        subject: &Subject,
        template: &NotificationTemplate,
        channel: Channel,
    ) -> Option<PermissionRecord> {
        let account_id = subject.id.account_id()?;

        match self
            .permissions
            .get_permission(account_id, template.id, channel)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                let err = NotificationError::PermissionLookup(e);
                tracing::warn!(
                    subject_id = account_id,
                    template = %template.key,
                    channel = %channel,
                    error = %err,
                    "Treating failed permission lookup as no record"
                );
                None
            }
        }
    }

    async fn lookup_opt_in(&self, subject: &Subject, channel: Channel) -> bool {
        let Some(account_id) = subject.id.account_id() else {
            return false;
        };

        match self
            .permissions
            .get_user_channel_opt_in(account_id, channel)
            .await
        {
            Ok(opted_in) => opted_in,
            Err(e) => {
                tracing::warn!(
                    subject_id = account_id,
                    channel = %channel,
                    error = %e,
                    "Channel opt-in lookup failed, treating as opted out"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrgRole, PublishState, SubjectType, TemplatePair};
    use crate::notification::context::NotificationRequest;
    use crate::store::MemoryPermissionStore;

    fn member(id: i64) -> Subject {
        Subject::new(SubjectType::OrgScoped(OrgRole::Member), id)
    }

    fn gate(store: Arc<MemoryPermissionStore>) -> PermissionGate {
        PermissionGate::new(Arc::new(TemplateRegistry::default()), store)
    }

    fn template(id: i64, key: &str, channel: Channel) -> NotificationTemplate {
        NotificationTemplate::new(id, key, channel).with_content("Title", "Body")
    }

    #[tokio::test]
    async fn test_no_record_allows_mandatory_template() {
        let gate = gate(Arc::new(MemoryPermissionStore::new()));
        let tpl = template(1, "TransactionInvoice", Channel::Email);

        assert!(
            gate.is_channel_enabled(&member(5), "TransactionInvoice", Some(&tpl), Channel::Email)
                .await
        );
    }

    #[tokio::test]
    async fn test_no_record_denies_editable_or_unpublished_template() {
        let gate = gate(Arc::new(MemoryPermissionStore::new()));

        let editable = template(1, "JobRenew", Channel::Email).editable(true);
        assert!(!gate.is_channel_enabled(&member(5), "JobRenew", Some(&editable), Channel::Email).await);

        let draft = template(2, "JobRenew", Channel::Email).with_publish_state(PublishState::Draft);
        assert!(!gate.is_channel_enabled(&member(5), "JobRenew", Some(&draft), Channel::Email).await);
    }

    #[tokio::test]
    async fn test_record_requires_opt_in_and_flag() {
        let store = Arc::new(MemoryPermissionStore::new());
        store.insert(PermissionRecord::new(5, 1, Channel::Email, true));
        let gate = gate(store.clone());
        let tpl = template(1, "JobRenew", Channel::Email).editable(true);

        // Switch on, account-wide opt-in missing
        assert!(!gate.is_channel_enabled(&member(5), "JobRenew", Some(&tpl), Channel::Email).await);

        store.set_opt_in(5, Channel::Email, true);
        assert!(gate.is_channel_enabled(&member(5), "JobRenew", Some(&tpl), Channel::Email).await);

        store.insert(PermissionRecord::new(5, 1, Channel::Email, false));
        assert!(!gate.is_channel_enabled(&member(5), "JobRenew", Some(&tpl), Channel::Email).await);
    }

    #[tokio::test]
    async fn test_exceptional_template_overrides_records() {
        let store = Arc::new(MemoryPermissionStore::new());
        store.insert(PermissionRecord::new(5, 1, Channel::Email, false));
        store.insert(PermissionRecord::new(5, 2, Channel::Push, true));
        store.set_opt_in(5, Channel::Push, true);
        let gate = gate(store);

        let request = NotificationRequest::new(SubjectType::Individual, 5, "ForgotPassword");
        let templates = TemplatePair {
            email: Some(template(1, "ForgotPassword", Channel::Email).editable(true)),
            push: Some(template(2, "ForgotPassword", Channel::Push)),
        };
        let decision = gate
            .evaluate(&member(5), &SendContext::new(request, templates))
            .await;

        assert_eq!(decision, ChannelDecision::new(true, false));
    }

    #[tokio::test]
    async fn test_bypass_template_allows_without_template() {
        let gate = gate(Arc::new(MemoryPermissionStore::new()));
        assert!(gate.is_channel_enabled(&member(5), "ApplyOnJobExternal", None, Channel::Email).await);
    }

    #[tokio::test]
    async fn test_missing_template_disables_channel() {
        let gate = gate(Arc::new(MemoryPermissionStore::new()));
        assert!(!gate.is_channel_enabled(&member(5), "JobRenew", None, Channel::Push).await);
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let store = Arc::new(MemoryPermissionStore::new());
        store.insert(PermissionRecord::new(5, 2, Channel::Push, false));
        store.set_opt_in(5, Channel::Push, true);
        let gate = gate(store);

        let request = NotificationRequest::new(SubjectType::Individual, 5, "JobRenew");
        let templates = TemplatePair {
            email: Some(template(1, "JobRenew", Channel::Email)),
            push: Some(template(2, "JobRenew", Channel::Push)),
        };
        let decision = gate
            .evaluate(&member(5), &SendContext::new(request, templates))
            .await;

        assert_eq!(decision, ChannelDecision::new(true, false));
    }

    #[tokio::test]
    async fn test_opaque_id_skips_record_lookup() {
        let store = Arc::new(MemoryPermissionStore::new());
        let gate = gate(store);
        let opaque = Subject::new(
            SubjectType::Individual,
            crate::domain::SubjectRef::Opaque("ext-9".into()),
        );
        let tpl = template(1, "Welcome", Channel::Email);

        assert!(gate.is_channel_enabled(&opaque, "Welcome", Some(&tpl), Channel::Email).await);
    }
}
