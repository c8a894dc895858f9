//! Builds channel payloads and hands them to the delivery queue.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::BrandingConfig;
use crate::delivery::{DeliveryTaskQueue, EmailTask, PushTask};
use crate::domain::template::{substitute, CcDirective, Macros, TemplateRegistry};
use crate::domain::{Channel, Destination, NewInboxRecord, Subject, SYSTEM_SOURCE};
use crate::metrics::PipelineMetrics;
use crate::store::InboxRecordStore;

use super::address_book::AddressBook;
use super::context::SendContext;
use super::error::{NotificationError, NotificationResult};
use super::resolver::RecipientSet;

/// Result of the push path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushDispatch {
    pub inbox_record_id: Option<i64>,
    /// Number of push tasks enqueued (0 or 1)
    pub tasks: usize,
}

/// Turns resolved recipients and templates into delivery tasks
pub struct ChannelDispatcher {
    registry: Arc<TemplateRegistry>,
    address_book: AddressBook,
    branding: BrandingConfig,
    inbox: Arc<dyn InboxRecordStore>,
    queue: Arc<dyn DeliveryTaskQueue>,
}

impl ChannelDispatcher {
    pub fn new(
        registry: Arc<TemplateRegistry>,
        address_book: AddressBook,
        branding: BrandingConfig,
        inbox: Arc<dyn InboxRecordStore>,
        queue: Arc<dyn DeliveryTaskQueue>,
    ) -> Self {
        Self {
            registry,
            address_book,
            branding,
            inbox,
            queue,
        }
    }

    /// Caller macros plus the site constants; a constant replaces a caller
    /// value of the same name
    fn email_macros(&self, caller: &Macros) -> Macros {
        let mut macros = caller.clone();
        let constants = [
            ("app_url", &self.branding.app_url),
            ("app_url_hire", &self.branding.app_url_hire),
            ("fb_url", &self.branding.fb_url),
            ("tw_url", &self.branding.tw_url),
            ("insta_url", &self.branding.insta_url),
            ("linkedin_url", &self.branding.linkedin_url),
            ("youtube_url", &self.branding.youtube_url),
        ];
        for (key, value) in constants {
            macros.insert(key.to_string(), Value::String(value.clone()));
        }
        macros.insert(
            "copyright_year".to_string(),
            Value::String(Utc::now().year().to_string()),
        );
        macros
    }

    /// Assemble the email envelope, or `None` without an email template
    pub fn build_email(&self, ctx: &SendContext, recipients: &RecipientSet) -> Option<EmailTask> {
        let template = ctx.templates.email.as_ref()?;
        let request = &ctx.request;
        let key = ctx.template_key();

        let to = recipients
            .primary()
            .and_then(Subject::email_address)
            .unwrap_or_else(|| self.address_book.operations_fallback())
            .to_string();

        let resolved_cc: Vec<String> = match self.registry.cc_directive(key) {
            CcDirective::Resolved => email_of(recipients.cc()),
            CcDirective::PartnerConfirmation => {
                vec![self.address_book.partner_confirmation().to_string()]
            }
            CcDirective::Cleared => Vec::new(),
        };
        let resolved_bcc = email_of(recipients.bcc());

        let (cc, bcc) = if request.to_admin {
            let list = self.registry.admin_list(key);
            (
                self.address_book.admin_broadcast_cc(list),
                self.address_book.admin_broadcast_bcc(),
            )
        } else if self.registry.requires_escalation(key) {
            (resolved_cc, self.address_book.escalation_bcc())
        } else {
            // Escalation BCC goes out as a visible CC here
            let mut cc = resolved_cc;
            cc.extend(resolved_bcc);
            (cc, Vec::new())
        };

        let macros = self.email_macros(&request.macros);

        Some(EmailTask {
            to,
            subject: substitute(&template.title, &macros),
            body: substitute(&template.body, &macros),
            attachments: request.attachment.iter().cloned().collect(),
            reply_to: request.reply_to.clone(),
            cc: without_blanks(cc),
            bcc: without_blanks(bcc),
        })
    }

    /// Enqueue the email task; returns whether one was enqueued
    #[tracing::instrument(
        name = "notification.dispatch_email",
        skip(self, ctx, recipients),
        fields(template = %ctx.request.template_key)
    )]
    pub async fn dispatch_email(
        &self,
        ctx: &SendContext,
        recipients: &RecipientSet,
    ) -> NotificationResult<bool> {
        let Some(task) = self.build_email(ctx, recipients) else {
            let err = NotificationError::TemplateNotFound {
                channel: Channel::Email,
                key: ctx.template_key().to_string(),
            };
            tracing::warn!(error = %err, "Skipping email");
            return Ok(false);
        };

        tracing::debug!(
            to = %task.to,
            cc = task.cc.len(),
            bcc = task.bcc.len(),
            "Email envelope built"
        );

        self.queue
            .enqueue_email(task)
            .await
            .map_err(|source| NotificationError::Enqueue {
                channel: Channel::Email,
                source,
            })?;

        Ok(true)
    }

    /// Persist the inbox row, then fan out to the account's devices
    #[tracing::instrument(
        name = "notification.dispatch_push",
        skip(self, ctx, primary),
        fields(template = %ctx.request.template_key, subject_id = %primary.id)
    )]
    pub async fn dispatch_push(
        &self,
        ctx: &SendContext,
        primary: &Subject,
    ) -> NotificationResult<PushDispatch> {
        let Some(template) = ctx.templates.push.as_ref() else {
            tracing::debug!("No push template, skipping push");
            return Ok(PushDispatch::default());
        };

        let Some(user_id) = primary.id.account_id() else {
            tracing::debug!("Recipient has no numeric account id, skipping push");
            return Ok(PushDispatch::default());
        };

        let request = &ctx.request;
        let title = substitute(&template.title, &request.macros);
        let body = substitute(&template.body, &request.macros);

        let record = NewInboxRecord {
            title: title.clone(),
            body: body.clone(),
            source: SYSTEM_SOURCE.to_string(),
            destination: Destination::for_subject(request.subject_type),
            user_id,
            reference_id: request.reference_id(),
            payload: request.payload(),
            is_read: false,
            template_id: template.id,
            template_key: request.template_key.clone(),
            created_at: Utc::now(),
        };

        let inbox_record_id = self.write_inbox(&record).await?;

        let tokens = device_tokens(primary);
        if tokens.is_empty() {
            tracing::info!(user_id = user_id, "No device tokens on file, push skipped");
            return Ok(PushDispatch {
                inbox_record_id: Some(inbox_record_id),
                tasks: 0,
            });
        }

        let token_count = tokens.len();
        self.queue
            .enqueue_push(PushTask::new(tokens, title, body))
            .await
            .map_err(|source| NotificationError::Enqueue {
                channel: Channel::Push,
                source,
            })?;

        tracing::debug!(user_id = user_id, tokens = token_count, "Push task enqueued");

        Ok(PushDispatch {
            inbox_record_id: Some(inbox_record_id),
            tasks: 1,
        })
    }

    /// Insert one inbox row in its own transaction
    async fn write_inbox(&self, record: &NewInboxRecord) -> NotificationResult<i64> {
        let mut tx = self
            .inbox
            .begin()
            .await
            .map_err(NotificationError::InboxInsert)?;

        let inserted = tx.insert(record).await;
        let id = match inserted {
            Ok(id) => id,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Inbox rollback failed");
                }
                PipelineMetrics::record_inbox_write(false);
                return Err(NotificationError::InboxInsert(e));
            }
        };

        if let Err(e) = tx.commit().await {
            PipelineMetrics::record_inbox_write(false);
            return Err(NotificationError::InboxInsert(e));
        }

        PipelineMetrics::record_inbox_write(true);
        Ok(id)
    }
}

/// Multi-device tokens, falling back to the legacy single token
fn device_tokens(subject: &Subject) -> Vec<String> {
    let tokens: Vec<String> = subject
        .device_tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if !tokens.is_empty() {
        return tokens;
    }

    subject
        .legacy_device_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| vec![t.to_string()])
        .unwrap_or_default()
}

fn email_of(subject: Option<&Subject>) -> Vec<String> {
    subject
        .and_then(Subject::email_address)
        .map(|address| vec![address.to_string()])
        .unwrap_or_default()
}

fn without_blanks(addresses: Vec<String>) -> Vec<String> {
    addresses
        .into_iter()
        .filter(|a| !a.trim().is_empty())
        .collect()
}
