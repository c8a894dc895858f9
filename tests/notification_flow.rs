//! End-to-end notification flow tests
//!
//! These tests drive the orchestrator against in-memory stores and the
//! in-memory task queue, then inspect what was enqueued and persisted.

use std::sync::Arc;

use serde_json::json;

use system_notifications::config::{BrandingConfig, DeliveryConfig, DeploymentEnvironment};
use system_notifications::delivery::{DeliveryTask, EmailTask, MemoryTaskQueue, PushTask};
use system_notifications::domain::template::{ResolutionStrategy, TemplateRegistry};
use system_notifications::domain::{
    Channel, NotificationTemplate, OrgRole, Organization, PermissionRecord, Subject, SubjectRef,
    SubjectType,
};
use system_notifications::notification::{
    AddressBook, ChannelDispatcher, NotificationOrchestrator, NotificationRequest,
    OrchestrationState, PermissionGate, RecipientResolver,
};
use system_notifications::store::{
    MemoryDirectory, MemoryInboxStore, MemoryPermissionStore, MemoryTemplateStore,
};

const MEMBER: SubjectType = SubjectType::OrgScoped(OrgRole::Member);

struct TestEnvironment {
    templates: Arc<MemoryTemplateStore>,
    permissions: Arc<MemoryPermissionStore>,
    directory: Arc<MemoryDirectory>,
    inbox: Arc<MemoryInboxStore>,
    queue: Arc<MemoryTaskQueue>,
    orchestrator: NotificationOrchestrator,
}

fn delivery_config(environment: DeploymentEnvironment) -> DeliveryConfig {
    DeliveryConfig {
        environment,
        management_list: vec!["management@example.com".to_string()],
        higher_management_list: vec!["directors@example.com".to_string()],
        report_list: vec!["reports@example.com".to_string()],
        staging_list: vec!["staging@example.com".to_string()],
        partner_confirmation_address: "partners@example.com".to_string(),
        partner_confirmation_address_staging: "partners-stage@example.com".to_string(),
        operations_fallback_address: "ops@example.com".to_string(),
        operations_fallback_address_staging: "ops-stage@example.com".to_string(),
    }
}

fn create_test_environment(environment: DeploymentEnvironment) -> TestEnvironment {
    let templates = Arc::new(MemoryTemplateStore::new());
    let permissions = Arc::new(MemoryPermissionStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    let inbox = Arc::new(MemoryInboxStore::new());
    let queue = Arc::new(MemoryTaskQueue::new());

    let registry = Arc::new(TemplateRegistry::default());
    let gate = Arc::new(PermissionGate::new(registry.clone(), permissions.clone()));
    let resolver = RecipientResolver::new(registry.clone(), directory.clone(), gate.clone());
    let branding = BrandingConfig {
        app_url: "https://app.example.com".to_string(),
        ..BrandingConfig::default()
    };
    let dispatcher = ChannelDispatcher::new(
        registry,
        AddressBook::new(delivery_config(environment)),
        branding,
        inbox.clone(),
        queue.clone(),
    );
    let orchestrator = NotificationOrchestrator::new(templates.clone(), resolver, gate, dispatcher);

    TestEnvironment {
        templates,
        permissions,
        directory,
        inbox,
        queue,
        orchestrator,
    }
}

/// Member 1 in org 10 (admin 2), whose parent org 20 is run by admin 3
fn seed_hierarchy(env: &TestEnvironment, source: Option<&str>) {
    env.directory.insert_account(
        Subject::new(MEMBER, 1)
            .with_email("member@example.com")
            .with_organization(10)
            .with_device_tokens(vec!["member-phone".to_string()]),
    );
    env.directory.insert_account(
        Subject::new(SubjectType::OrgScoped(OrgRole::Admin), 2)
            .with_email("admin@example.com")
            .with_organization(10),
    );
    env.directory.insert_account(
        Subject::new(SubjectType::OrgScoped(OrgRole::SuperAdmin), 3)
            .with_email("super@example.com")
            .with_organization(20),
    );

    let mut organization = Organization::new(10).with_admin(2).with_parent(20);
    if let Some(tag) = source {
        organization = organization.with_source_tag(tag);
    }
    env.directory.insert_organization(organization);
    env.directory
        .insert_organization(Organization::new(20).with_admin(3));
}

/// Email template gets `id`, push template gets `id + 1`
fn seed_templates(env: &TestEnvironment, key: &str, id: i64) {
    env.templates.insert(
        NotificationTemplate::new(id, key, Channel::Email)
            .with_content("{{$title}} for {{$name}}", "<p>Visit {{$app_url}}</p>"),
    );
    env.templates.insert(
        NotificationTemplate::new(id + 1, key, Channel::Push)
            .with_content("{{$title}}", "Hello {{$name}}"),
    );
}

async fn emails(env: &TestEnvironment) -> Vec<EmailTask> {
    env.queue
        .pending()
        .await
        .into_iter()
        .filter_map(|queued| match queued.task {
            DeliveryTask::Email(task) => Some(task),
            DeliveryTask::Push(_) => None,
        })
        .collect()
}

async fn pushes(env: &TestEnvironment) -> Vec<PushTask> {
    env.queue
        .pending()
        .await
        .into_iter()
        .filter_map(|queued| match queued.task {
            DeliveryTask::Push(task) => Some(task),
            DeliveryTask::Email(_) => None,
        })
        .collect()
}

fn request(subject_type: SubjectType, id: impl Into<SubjectRef>, key: &str) -> NotificationRequest {
    NotificationRequest::new(subject_type, id, key)
        .with_macro("title", "Update")
        .with_macro("name", "Sam")
}

#[tokio::test]
async fn test_company_admin_template_defaults_to_allowed() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_hierarchy(&env, None);
    seed_templates(&env, "TransactionInvoice", 100);

    let report = env
        .orchestrator
        .send(request(MEMBER, 1, "TransactionInvoice"))
        .await;

    assert!(report.is_success());
    assert_eq!(report.strategy, Some(ResolutionStrategy::CompanyAdmin));
    assert!(report.email_enqueued);

    let sent = emails(&env).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "admin@example.com");
    assert_eq!(sent[0].cc, vec!["super@example.com".to_string()]);
    assert!(sent[0].bcc.is_empty());
    assert_eq!(sent[0].subject, "Update for Sam");
    assert_eq!(sent[0].body, "<p>Visit https://app.example.com</p>");

    // Admin has no devices: inbox row written, nothing to push
    assert_eq!(report.push_tasks, 0);
    assert!(report.inbox_record_id.is_some());
    assert_eq!(env.inbox.records_for(2).len(), 1);
    assert!(env.inbox.records_for(1).is_empty());
}

#[tokio::test]
async fn test_concern_person_escalation_precedence() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_hierarchy(&env, None);
    seed_templates(&env, "ApplyOnJob", 200);

    let report = env.orchestrator.send(request(MEMBER, 1, "ApplyOnJob")).await;

    assert!(report.is_success());
    assert_eq!(report.strategy, Some(ResolutionStrategy::ConcernPerson));

    let sent = emails(&env).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "member@example.com");
    assert_eq!(sent[0].cc, vec!["admin@example.com".to_string()]);
    assert_eq!(sent[0].bcc, vec!["directors@example.com".to_string()]);

    let push = pushes(&env).await;
    assert_eq!(push.len(), 1);
    assert_eq!(push[0].tokens, vec!["member-phone".to_string()]);
    assert_eq!(push[0].body, "Hello Sam");
}

#[tokio::test]
async fn test_opted_out_concern_person_promotes_admin() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_hierarchy(&env, None);
    seed_templates(&env, "JobRenew", 300);
    env.permissions
        .insert(PermissionRecord::new(1, 300, Channel::Email, false));

    let report = env.orchestrator.send(request(MEMBER, 1, "JobRenew")).await;

    assert!(report.is_success());
    let sent = emails(&env).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "admin@example.com");
    // Not an escalation template: the super admin is copied openly
    assert_eq!(sent[0].cc, vec!["super@example.com".to_string()]);
    assert!(sent[0].bcc.is_empty());
}

#[tokio::test]
async fn test_disqualifying_source_skips_concern_person() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_hierarchy(&env, Some("Rover"));
    seed_templates(&env, "JobRenew", 300);

    let report = env.orchestrator.send(request(MEMBER, 1, "JobRenew")).await;

    assert!(report.is_success());
    let sent = emails(&env).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "admin@example.com");
    assert_ne!(sent[0].to, "member@example.com");
}

#[tokio::test]
async fn test_disqualifying_source_leaves_company_admin_unresolved() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_hierarchy(&env, Some("rover"));
    seed_templates(&env, "TransactionInvoice", 100);

    let report = env
        .orchestrator
        .send(request(MEMBER, 1, "TransactionInvoice"))
        .await;

    assert!(report.is_success());
    assert!(!report.email_enqueued);
    assert_eq!(env.queue.pending().await.len(), 0);
    assert_eq!(env.inbox.count(), 0);
}

#[tokio::test]
async fn test_unresolved_recipient_is_a_successful_noop() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_templates(&env, "Welcome", 400);

    let sent = env
        .orchestrator
        .notify(request(SubjectType::Individual, 999, "Welcome"))
        .await;

    assert!(sent);
    assert!(env.queue.pending().await.is_empty());
}

#[tokio::test]
async fn test_partner_confirmation_forces_cc() {
    let env = create_test_environment(DeploymentEnvironment::Staging);
    seed_templates(&env, "AggregationPartnerConfirmation", 500);
    env.directory.insert_account(
        Subject::new(SubjectType::Individual, 50).with_email("partner@example.com"),
    );

    let report = env
        .orchestrator
        .send(request(SubjectType::Individual, 50, "AggregationPartnerConfirmation"))
        .await;

    assert!(report.is_success());
    assert_eq!(report.strategy, Some(ResolutionStrategy::Direct));
    let sent = emails(&env).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "partner@example.com");
    assert_eq!(sent[0].cc, vec!["partners-stage@example.com".to_string()]);
}

#[tokio::test]
async fn test_admin_broadcast_is_redirected_outside_production() {
    let env = create_test_environment(DeploymentEnvironment::Staging);
    seed_templates(&env, "Welcome", 400);
    env.directory.insert_account(
        Subject::new(SubjectType::Individual, 51).with_email("person@example.com"),
    );

    let report = env
        .orchestrator
        .send(request(SubjectType::Individual, 51, "Welcome").to_admin(true))
        .await;

    assert!(report.is_success());
    let sent = emails(&env).await;
    assert_eq!(sent[0].cc, vec!["staging@example.com".to_string()]);
    assert_eq!(sent[0].bcc, vec!["staging@example.com".to_string()]);
}

#[tokio::test]
async fn test_inbox_failure_rolls_back_and_skips_push() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    env.templates.insert(
        NotificationTemplate::new(600, "Welcome", Channel::Push).with_content("x".repeat(300), "Hi"),
    );
    env.directory.insert_account(
        Subject::new(SubjectType::Individual, 52)
            .with_device_tokens(vec!["phone".to_string()]),
    );

    let report = env
        .orchestrator
        .send(request(SubjectType::Individual, 52, "Welcome"))
        .await;

    assert!(!report.is_success());
    assert_eq!(report.state, OrchestrationState::Failed);
    assert_eq!(report.failed_at, Some(OrchestrationState::Dispatching));
    assert!(report.error.is_some());
    assert_eq!(env.inbox.count(), 0);
    assert!(pushes(&env).await.is_empty());
}

#[tokio::test]
async fn test_legacy_token_used_when_no_device_sessions() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_templates(&env, "Welcome", 400);
    env.directory.insert_account(
        Subject::new(SubjectType::Individual, 53).with_legacy_token("old-phone"),
    );

    let report = env
        .orchestrator
        .send(request(SubjectType::Individual, 53, "Welcome"))
        .await;

    assert!(report.is_success());
    assert_eq!(report.push_tasks, 1);
    // No address on file: operations mailbox receives the email
    assert_eq!(emails(&env).await[0].to, "ops@example.com");
    assert_eq!(pushes(&env).await[0].tokens, vec!["old-phone".to_string()]);
}

#[tokio::test]
async fn test_channels_are_gated_independently() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_templates(&env, "Welcome", 400);
    env.directory.insert_account(
        Subject::new(SubjectType::Individual, 54)
            .with_email("person@example.com")
            .with_device_tokens(vec!["phone".to_string()]),
    );
    env.permissions
        .insert(PermissionRecord::new(54, 401, Channel::Push, false));
    env.permissions.set_opt_in(54, Channel::Push, true);

    let report = env
        .orchestrator
        .send(request(SubjectType::Individual, 54, "Welcome"))
        .await;

    assert!(report.decision.email);
    assert!(!report.decision.push);
    assert_eq!(emails(&env).await.len(), 1);
    assert!(pushes(&env).await.is_empty());
    assert_eq!(env.inbox.count(), 0);
}

#[tokio::test]
async fn test_exceptional_template_sends_email_only() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_templates(&env, "ForgotPassword", 700);
    env.directory.insert_account(
        Subject::new(SubjectType::Individual, 55)
            .with_email("person@example.com")
            .with_device_tokens(vec!["phone".to_string()]),
    );
    env.permissions
        .insert(PermissionRecord::new(55, 700, Channel::Email, false));

    let report = env
        .orchestrator
        .send(request(SubjectType::Individual, 55, "ForgotPassword"))
        .await;

    assert!(report.is_success());
    assert!(report.email_enqueued);
    assert_eq!(report.push_tasks, 0);
    assert_eq!(env.inbox.count(), 0);
}

#[tokio::test]
async fn test_opaque_subject_gets_email_but_no_push() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_templates(&env, "Welcome", 400);
    env.directory.insert_account(
        Subject::new(SubjectType::Individual, SubjectRef::Opaque("ext-7".to_string()))
            .with_email("external@example.com")
            .with_device_tokens(vec!["phone".to_string()]),
    );

    let report = env
        .orchestrator
        .send(request(
            SubjectType::Individual,
            SubjectRef::Opaque("ext-7".to_string()),
            "Welcome",
        ))
        .await;

    assert!(report.is_success());
    assert!(!report.decision.push);
    assert_eq!(emails(&env).await[0].to, "external@example.com");
    assert!(pushes(&env).await.is_empty());
}

#[tokio::test]
async fn test_repeated_sends_render_identically() {
    let env = create_test_environment(DeploymentEnvironment::Production);
    seed_templates(&env, "Welcome", 400);
    env.directory.insert_account(
        Subject::new(SubjectType::Individual, 56).with_email("person@example.com"),
    );

    let req = request(SubjectType::Individual, 56, "Welcome")
        .with_macro("name", json!({"first": "Sam", "last": "Lee"}))
        .with_macro("reference_id", 42);

    env.orchestrator.send(req.clone()).await;
    env.orchestrator.send(req).await;

    let sent = emails(&env).await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].subject, sent[1].subject);
    assert_eq!(sent[0].body, sent[1].body);

    let inbox = env.inbox.records_for(56);
    assert_eq!(inbox.len(), 2);
    assert_eq!(inbox[0].record.reference_id.as_deref(), Some("42"));
    assert_eq!(inbox[0].record.body, inbox[1].record.body);
}
