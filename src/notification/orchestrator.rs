//! Drives one notification through loading, resolution, gating and dispatch.
//!
//! ```text
//! TemplatesLoading -> RecipientResolving -> PermissionChecking -> Dispatching -> Done
//!        \_________________\_____________________\__________________\-> Failed
//! ```
//!
//! Nothing escapes [`NotificationOrchestrator::send`]: every error is logged
//! and reported as a `Failed` outcome.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::config::Settings;
use crate::delivery::DeliveryTaskQueue;
use crate::domain::template::{ResolutionStrategy, TemplateRegistry};
use crate::domain::{Channel, ChannelDecision, NotificationTemplate, TemplatePair};
use crate::metrics::PipelineMetrics;
use crate::store::{Stores, TemplateStore};

use super::address_book::AddressBook;
use super::context::{NotificationRequest, SendContext};
use super::dispatcher::ChannelDispatcher;
use super::error::NotificationError;
use super::gate::PermissionGate;
use super::resolver::RecipientResolver;

/// Pipeline stage of a send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
    TemplatesLoading,
    RecipientResolving,
    PermissionChecking,
    Dispatching,
    Done,
    Failed,
}

impl OrchestrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationState::TemplatesLoading => "templates_loading",
            OrchestrationState::RecipientResolving => "recipient_resolving",
            OrchestrationState::PermissionChecking => "permission_checking",
            OrchestrationState::Dispatching => "dispatching",
            OrchestrationState::Done => "done",
            OrchestrationState::Failed => "failed",
        }
    }
}

/// What a send did
#[derive(Debug, Clone, Serialize)]
pub struct NotificationReport {
    pub state: OrchestrationState,
    /// State the send was in when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<OrchestrationState>,
    pub strategy: Option<ResolutionStrategy>,
    pub decision: ChannelDecision,
    pub email_enqueued: bool,
    pub push_tasks: usize,
    pub inbox_record_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationReport {
    fn new() -> Self {
        Self {
            state: OrchestrationState::TemplatesLoading,
            failed_at: None,
            strategy: None,
            decision: ChannelDecision::default(),
            email_enqueued: false,
            push_tasks: 0,
            inbox_record_id: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == OrchestrationState::Done
    }

    /// Label used for the outcome metric
    fn outcome(&self) -> &'static str {
        match self.state {
            OrchestrationState::Failed => "failed",
            _ if self.strategy.is_some() && !self.email_enqueued && self.push_tasks == 0 => "noop",
            _ => "done",
        }
    }
}

/// Entry point of the notification core
pub struct NotificationOrchestrator {
    templates: Arc<dyn TemplateStore>,
    resolver: RecipientResolver,
    gate: Arc<PermissionGate>,
    dispatcher: ChannelDispatcher,
}

impl NotificationOrchestrator {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        resolver: RecipientResolver,
        gate: Arc<PermissionGate>,
        dispatcher: ChannelDispatcher,
    ) -> Self {
        Self {
            templates,
            resolver,
            gate,
            dispatcher,
        }
    }

    /// Wire the pipeline from settings, stores and a task queue
    pub fn from_settings(
        settings: &Settings,
        stores: &Stores,
        queue: Arc<dyn DeliveryTaskQueue>,
    ) -> Self {
        let registry = Arc::new(TemplateRegistry::from_settings(&settings.templates));
        let gate = Arc::new(PermissionGate::new(
            registry.clone(),
            stores.permissions.clone(),
        ));
        let resolver = RecipientResolver::new(registry.clone(), stores.directory.clone(), gate.clone());
        let dispatcher = ChannelDispatcher::new(
            registry,
            AddressBook::new(settings.delivery.clone()),
            settings.branding.clone(),
            stores.inbox.clone(),
            queue,
        );

        Self::new(stores.templates.clone(), resolver, gate, dispatcher)
    }

    /// Send a notification, returning `true` unless a step failed
    pub async fn notify(&self, request: NotificationRequest) -> bool {
        self.send(request).await.is_success()
    }

    /// Send a notification and report what happened
    #[tracing::instrument(
        name = "notification.send",
        skip(self, request),
        fields(
            template = %request.template_key,
            subject_type = request.subject_type.as_str(),
            subject_id = %request.subject_id,
            to_admin = request.to_admin,
        )
    )]
    pub async fn send(&self, request: NotificationRequest) -> NotificationReport {
        let started = Instant::now();
        let mut report = NotificationReport::new();

        if let Err(e) = self.run(request, &mut report).await {
            tracing::error!(
                state = report.state.as_str(),
                error = %e,
                "Notification failed"
            );
            report.failed_at = Some(report.state);
            report.state = OrchestrationState::Failed;
            report.error = Some(e.to_string());
        }

        PipelineMetrics::record_outcome(report.outcome());
        PipelineMetrics::record_latency(started.elapsed().as_secs_f64());

        tracing::info!(
            outcome = report.outcome(),
            email = report.email_enqueued,
            push_tasks = report.push_tasks,
            "Notification processed"
        );

        report
    }

    async fn run(
        &self,
        request: NotificationRequest,
        report: &mut NotificationReport,
    ) -> Result<(), NotificationError> {
        report.state = OrchestrationState::TemplatesLoading;
        let templates = TemplatePair {
            email: self.load_template(Channel::Email, &request.template_key).await,
            push: self.load_template(Channel::Push, &request.template_key).await,
        };
        let ctx = SendContext::new(request, templates);

        report.state = OrchestrationState::RecipientResolving;
        let recipients = self.resolver.resolve(&ctx).await?;
        report.strategy = Some(recipients.strategy());

        let Some(primary) = recipients.primary() else {
            let unresolved = NotificationError::RecipientUnresolved {
                template: ctx.template_key().to_string(),
            };
            tracing::info!(reason = %unresolved, "Nothing to send");
            report.state = OrchestrationState::Done;
            return Ok(());
        };

        report.state = OrchestrationState::PermissionChecking;
        let mut decision = self.gate.evaluate(primary, &ctx).await;
        if decision.push && primary.id.account_id().is_none() {
            tracing::debug!("Push disabled for non-numeric recipient id");
            decision.push = false;
        }
        report.decision = decision;

        report.state = OrchestrationState::Dispatching;
        if decision.email {
            report.email_enqueued = self.dispatcher.dispatch_email(&ctx, &recipients).await?;
        }
        if decision.push {
            let push = self.dispatcher.dispatch_push(&ctx, primary).await?;
            report.inbox_record_id = push.inbox_record_id;
            report.push_tasks = push.tasks;
        }

        report.state = OrchestrationState::Done;
        Ok(())
    }

    /// Template for one channel; lookup failures count as missing
    async fn load_template(&self, channel: Channel, key: &str) -> Option<NotificationTemplate> {
        match self.templates.get_template(channel, key).await {
            Ok(Some(template)) => Some(template),
            Ok(None) => {
                let err = NotificationError::TemplateNotFound {
                    channel,
                    key: key.to_string(),
                };
                tracing::debug!(reason = %err, "Continuing without template");
                None
            }
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    template = %key,
                    error = %e,
                    "Template lookup failed, continuing without template"
                );
                None
            }
        }
    }
}
