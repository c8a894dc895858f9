//! Push delivery via Firebase Cloud Messaging (legacy HTTP API).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::FcmConfig;

use super::provider::{DeliveryError, PushProvider};

/// FCM request body for a single device
#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
    sound: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    click_action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    failure: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Default, Deserialize)]
struct FcmResult {
    error: Option<String>,
}

/// Sends push notifications through the FCM HTTP endpoint
pub struct FcmPushProvider {
    client: reqwest::Client,
    config: FcmConfig,
    server_key: String,
}

impl FcmPushProvider {
    /// Build the provider, or `None` when no server key is configured.
    pub fn from_config(config: &FcmConfig) -> Result<Option<Self>, DeliveryError> {
        let Some(server_key) = config.server_key.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        tracing::info!(endpoint = %config.endpoint, "FCM push provider configured");

        Ok(Some(Self {
            client,
            config: config.clone(),
            server_key,
        }))
    }

    fn request<'a>(&'a self, token: &'a str, title: &'a str, body: &'a str) -> FcmRequest<'a> {
        FcmRequest {
            to: token,
            notification: FcmNotification {
                title,
                body,
                sound: &self.config.sound,
                click_action: self.config.click_url.as_deref(),
                badge: self.config.badge,
            },
        }
    }
}

#[async_trait]
impl PushProvider for FcmPushProvider {
    fn name(&self) -> &'static str {
        "fcm"
    }

    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&self.request(token, title, body))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }

        let result: FcmResponse = response.json().await?;
        if result.failure > 0 {
            let reason = result
                .results
                .into_iter()
                .find_map(|r| r.error)
                .unwrap_or_else(|| "Unknown".to_string());
            return Err(DeliveryError::Rejected(reason));
        }

        tracing::debug!("FCM notification sent");
        Ok(())
    }
}
