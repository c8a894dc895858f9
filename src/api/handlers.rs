//! Notification trigger endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::notification::{NotificationReport, NotificationRequest};
use crate::server::AppState;

/// Response for a notification send
#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    /// Whether every step of the send succeeded
    pub success: bool,
    pub report: NotificationReport,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/v1/notifications
#[tracing::instrument(
    name = "http.send_notification",
    skip(state, request),
    fields(template = %request.template_key)
)]
pub async fn send_notification(
    State(state): State<AppState>,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<SendNotificationResponse>> {
    if request.template_key.trim().is_empty() {
        return Err(AppError::Validation("template_key must not be empty".to_string()));
    }

    let report = state.orchestrator.send(request).await;

    Ok(Json(SendNotificationResponse {
        success: report.is_success(),
        report,
        timestamp: Utc::now(),
    }))
}
