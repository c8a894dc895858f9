//! Delivery provider interfaces.
//!
//! Workers own one email provider and one push provider. Providers perform a
//! single attempt; retrying is the worker's job.

use async_trait::async_trait;
use thiserror::Error;

use super::task::EmailTask;

/// Errors that can occur while delivering a task.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// SMTP transport-level failure (authentication, connection, etc.)
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// A recipient or sender address could not be parsed
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled
    #[error("Email build error: {0}")]
    Build(String),

    /// An attachment could not be read
    #[error("Attachment error for {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP request to the push gateway failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The push gateway returned a non-2xx status code
    #[error("Push gateway returned HTTP {0}")]
    HttpStatus(u16),

    /// The push gateway rejected the token
    #[error("Push rejected: {0}")]
    Rejected(String),

    /// The provider has no credentials configured
    #[error("{0} provider is not configured")]
    NotConfigured(&'static str),
}

impl DeliveryError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Smtp(e) => !e.is_permanent(),
            DeliveryError::Http(_) => true,
            DeliveryError::HttpStatus(status) => *status >= 500 || *status == 429,
            DeliveryError::Rejected(reason) => !is_permanent_push_rejection(reason),
            DeliveryError::Address(_)
            | DeliveryError::Build(_)
            | DeliveryError::Attachment { .. }
            | DeliveryError::NotConfigured(_) => false,
        }
    }
}

/// FCM error codes that will not change on retry
fn is_permanent_push_rejection(reason: &str) -> bool {
    matches!(
        reason,
        "NotRegistered" | "InvalidRegistration" | "MismatchSenderId" | "MissingRegistration"
    )
}

/// Sends one email
#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, task: &EmailTask) -> Result<(), DeliveryError>;
}

/// Sends one push message to one device token
#[async_trait]
pub trait PushProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Provider used when a channel has no credentials configured
pub struct DisabledProvider;

#[async_trait]
impl EmailProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn send(&self, task: &EmailTask) -> Result<(), DeliveryError> {
        tracing::warn!(to = %task.to, "Email delivery is not configured, dropping task");
        Err(DeliveryError::NotConfigured("email"))
    }
}

#[async_trait]
impl PushProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn send(&self, _token: &str, title: &str, _body: &str) -> Result<(), DeliveryError> {
        tracing::warn!(title = %title, "Push delivery is not configured, dropping token");
        Err(DeliveryError::NotConfigured("push"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(DeliveryError::HttpStatus(503).is_retryable());
        assert!(DeliveryError::HttpStatus(429).is_retryable());
        assert!(!DeliveryError::HttpStatus(400).is_retryable());
        assert!(!DeliveryError::Rejected("NotRegistered".into()).is_retryable());
        assert!(DeliveryError::Rejected("Unavailable".into()).is_retryable());
        assert!(!DeliveryError::NotConfigured("email").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = DeliveryError::HttpStatus(502);
        assert_eq!(err.to_string(), "Push gateway returned HTTP 502");

        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = DeliveryError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }
}
