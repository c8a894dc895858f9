//! Email delivery via SMTP.
//!
//! [`SmtpEmailProvider`] wraps the `lettre` async SMTP transport. The
//! transport is built once and reused; lettre pools connections internally.

use std::path::Path;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

use super::provider::{DeliveryError, EmailProvider};
use super::task::EmailTask;

/// Sends HTML email through an SMTP relay
pub struct SmtpEmailProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailProvider {
    /// Build the provider, or `None` when no relay host is configured.
    pub fn from_config(config: &SmtpConfig) -> Result<Option<Self>, DeliveryError> {
        let Some(host) = config.host.as_deref() else {
            return Ok(None);
        };

        let relay = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        };
        let mut builder = relay.port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from = Mailbox::new(config.from_name.clone(), config.from_address.parse()?);

        tracing::info!(host = %host, port = config.port, "SMTP email provider configured");

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

/// Parse a copy or reply-to address, skipping it with a warning when malformed
fn optional_mailbox(header: &'static str, address: &str) -> Option<Mailbox> {
    match address.parse() {
        Ok(mailbox) => Some(mailbox),
        Err(e) => {
            tracing::warn!(header, address = %address, error = %e, "Skipping malformed address");
            None
        }
    }
}

/// Assemble the MIME message for a task.
///
/// Only the primary recipient must parse; a bad CC, BCC or reply-to address
/// is left off rather than losing the whole email.
pub(crate) async fn build_message(from: &Mailbox, task: &EmailTask) -> Result<Message, DeliveryError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .to(task.to.parse()?)
        .subject(task.subject.clone());

    for cc in task.cc.iter().filter_map(|a| optional_mailbox("cc", a)) {
        builder = builder.cc(cc);
    }
    for bcc in task.bcc.iter().filter_map(|a| optional_mailbox("bcc", a)) {
        builder = builder.bcc(bcc);
    }
    if let Some(reply_to) = task.reply_to.as_deref().and_then(|a| optional_mailbox("reply-to", a)) {
        builder = builder.reply_to(reply_to);
    }

    let html = SinglePart::html(task.body.clone());

    if task.attachments.is_empty() {
        return builder
            .singlepart(html)
            .map_err(|e| DeliveryError::Build(e.to_string()));
    }

    let mut multipart = MultiPart::mixed().singlepart(html);
    for path in &task.attachments {
        multipart = multipart.singlepart(read_attachment(path).await?);
    }

    builder
        .multipart(multipart)
        .map_err(|e| DeliveryError::Build(e.to_string()))
}

async fn read_attachment(path: &str) -> Result<SinglePart, DeliveryError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|source| DeliveryError::Attachment {
            path: path.to_string(),
            source,
        })?;

    let filename = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    let content_type = ContentType::parse("application/octet-stream")
        .map_err(|e| DeliveryError::Build(e.to_string()))?;

    Ok(Attachment::new(filename).body(content, content_type))
}

#[async_trait]
impl EmailProvider for SmtpEmailProvider {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, task: &EmailTask) -> Result<(), DeliveryError> {
        let message = build_message(&self.from, task).await?;
        self.transport.send(message).await?;

        tracing::info!(
            to = %task.to,
            cc = task.cc.len(),
            bcc = task.bcc.len(),
            "Notification email sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> EmailTask {
        EmailTask {
            to: "owner@example.com".to_string(),
            subject: "Invoice".to_string(),
            body: "<p>Paid</p>".to_string(),
            attachments: Vec::new(),
            reply_to: Some("support@example.com".to_string()),
            cc: vec!["admin@example.com".to_string()],
            bcc: vec!["audit@example.com".to_string()],
        }
    }

    fn from() -> Mailbox {
        "Notifications <no-reply@example.com>".parse().unwrap()
    }

    #[test]
    fn test_unconfigured_host_yields_none() {
        let provider = SmtpEmailProvider::from_config(&SmtpConfig::default()).unwrap();
        assert!(provider.is_none());
    }

    #[tokio::test]
    async fn test_build_message_sets_envelope() {
        let message = build_message(&from(), &task()).await.unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains("To: owner@example.com"));
        assert!(formatted.contains("Cc: admin@example.com"));
        assert!(formatted.contains("Reply-To: support@example.com"));
        assert!(formatted.contains("Subject: Invoice"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        let mut bad = task();
        bad.to = "not-an-address".to_string();
        let result = build_message(&from(), &bad).await;
        assert!(matches!(result, Err(DeliveryError::Address(_))));
    }

    #[tokio::test]
    async fn test_malformed_copy_addresses_are_skipped() {
        let mut mixed = task();
        mixed.cc = vec!["admin@example.com".to_string(), "not an address".to_string()];
        mixed.bcc = vec!["@broken".to_string(), "audit@example.com".to_string()];
        mixed.reply_to = Some("nope".to_string());

        let message = build_message(&from(), &mixed).await.unwrap();
        let mut recipients: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(|address| address.to_string())
            .collect();
        recipients.sort();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert_eq!(
            recipients,
            vec!["admin@example.com", "audit@example.com", "owner@example.com"]
        );
        assert!(!formatted.contains("Reply-To"));
    }

    #[tokio::test]
    async fn test_missing_attachment_is_reported() {
        let mut with_file = task();
        with_file.attachments = vec!["/nonexistent/invoice.pdf".to_string()];
        let result = build_message(&from(), &with_file).await;
        assert!(matches!(result, Err(DeliveryError::Attachment { .. })));
    }
}
