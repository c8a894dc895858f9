//! Recipient resolution across the organization hierarchy.
//!
//! The registry decides which strategy applies to a template. Concern-person
//! and company-admin strategies walk at most one parent organization level.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::template::{ResolutionStrategy, TemplateRegistry};
use crate::domain::{Channel, OrgRole, Organization, Subject, SubjectRef, SubjectType};
use crate::metrics::PipelineMetrics;
use crate::store::Directory;

use super::context::SendContext;
use super::error::{NotificationError, NotificationResult};
use super::gate::PermissionGate;

/// Recipients chosen for one send.
///
/// Built once by the resolver and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientSet {
    strategy: ResolutionStrategy,
    primary: Option<Subject>,
    cc: Option<Subject>,
    bcc: Option<Subject>,
}

impl RecipientSet {
    pub fn empty(strategy: ResolutionStrategy) -> Self {
        Self {
            strategy,
            primary: None,
            cc: None,
            bcc: None,
        }
    }

    pub fn direct(subject: Subject) -> Self {
        Self {
            strategy: ResolutionStrategy::Direct,
            primary: Some(subject),
            cc: None,
            bcc: None,
        }
    }

    /// Apply escalation precedence to the eligible candidates
    pub fn escalated(
        strategy: ResolutionStrategy,
        concern_person: Option<Subject>,
        admin: Option<Subject>,
        super_admin: Option<Subject>,
    ) -> Self {
        let (primary, cc, bcc) = match (concern_person, admin, super_admin) {
            (Some(person), admin, super_admin) => (Some(person), admin, super_admin),
            (None, Some(admin), super_admin) => (Some(admin), super_admin, None),
            (None, None, super_admin) => (super_admin, None, None),
        };

        Self {
            strategy,
            primary,
            cc,
            bcc,
        }
    }

    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    pub fn primary(&self) -> Option<&Subject> {
        self.primary.as_ref()
    }

    pub fn cc(&self) -> Option<&Subject> {
        self.cc.as_ref()
    }

    pub fn bcc(&self) -> Option<&Subject> {
        self.bcc.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none()
    }
}

/// Chooses primary and escalation recipients for a send
pub struct RecipientResolver {
    registry: Arc<TemplateRegistry>,
    directory: Arc<dyn Directory>,
    gate: Arc<PermissionGate>,
}

impl RecipientResolver {
    pub fn new(
        registry: Arc<TemplateRegistry>,
        directory: Arc<dyn Directory>,
        gate: Arc<PermissionGate>,
    ) -> Self {
        Self {
            registry,
            directory,
            gate,
        }
    }

    /// Strategy used for this request
    pub fn strategy_for(&self, ctx: &SendContext) -> ResolutionStrategy {
        match ctx.request.subject_type {
            SubjectType::Individual => ResolutionStrategy::Direct,
            SubjectType::OrgScoped(_) => self.registry.strategy(ctx.template_key()),
        }
    }

    #[tracing::instrument(
        name = "notification.resolve",
        skip(self, ctx),
        fields(
            template = %ctx.request.template_key,
            subject_type = ctx.request.subject_type.as_str(),
            subject_id = %ctx.request.subject_id,
        )
    )]
    pub async fn resolve(&self, ctx: &SendContext) -> NotificationResult<RecipientSet> {
        let strategy = self.strategy_for(ctx);

        let recipients = match strategy {
            ResolutionStrategy::Direct => self.resolve_direct(ctx).await?,
            ResolutionStrategy::ConcernPerson => self.resolve_concern_person(ctx).await?,
            ResolutionStrategy::CompanyAdmin => self.resolve_company_admin(ctx).await?,
        };

        PipelineMetrics::record_resolution(strategy.as_str(), !recipients.is_empty());
        tracing::debug!(
            strategy = strategy.as_str(),
            primary = ?recipients.primary().map(|s| s.id.to_string()),
            cc = ?recipients.cc().map(|s| s.id.to_string()),
            bcc = ?recipients.bcc().map(|s| s.id.to_string()),
            "Recipients resolved"
        );

        Ok(recipients)
    }

    async fn resolve_direct(&self, ctx: &SendContext) -> NotificationResult<RecipientSet> {
        let subject = self
            .account(ctx.request.subject_type, &ctx.request.subject_id)
            .await?;

        Ok(subject
            .map(RecipientSet::direct)
            .unwrap_or_else(|| RecipientSet::empty(ResolutionStrategy::Direct)))
    }

    async fn resolve_concern_person(&self, ctx: &SendContext) -> NotificationResult<RecipientSet> {
        let strategy = ResolutionStrategy::ConcernPerson;

        let Some(subject) = self
            .account(ctx.request.subject_type, &ctx.request.subject_id)
            .await?
        else {
            return Ok(RecipientSet::empty(strategy));
        };

        let mut concern_person = if self.passes(&subject, ctx).await {
            Some(subject.clone())
        } else {
            None
        };

        let Some(organization) = self.owning_organization(&subject).await? else {
            return Ok(RecipientSet::escalated(strategy, concern_person, None, None));
        };

        if self
            .registry
            .is_disqualifying_source(organization.source_tag.as_deref())
        {
            tracing::debug!(
                organization_id = organization.id,
                source = ?organization.source_tag,
                "Organization source rules out concern-person routing"
            );
            concern_person = None;
        }

        let (admin, super_admin) = self.admin_and_super_admin(&organization, ctx).await?;
        Ok(RecipientSet::escalated(strategy, concern_person, admin, super_admin))
    }

    async fn resolve_company_admin(&self, ctx: &SendContext) -> NotificationResult<RecipientSet> {
        let strategy = ResolutionStrategy::CompanyAdmin;

        let Some(subject) = self
            .account(ctx.request.subject_type, &ctx.request.subject_id)
            .await?
        else {
            return Ok(RecipientSet::empty(strategy));
        };

        let Some(organization) = self.owning_organization(&subject).await? else {
            return Ok(RecipientSet::empty(strategy));
        };

        if self
            .registry
            .is_disqualifying_source(organization.source_tag.as_deref())
        {
            tracing::debug!(
                organization_id = organization.id,
                source = ?organization.source_tag,
                "Organization source rules out company-admin routing"
            );
            return Ok(RecipientSet::empty(strategy));
        }

        let (admin, super_admin) = self.admin_and_super_admin(&organization, ctx).await?;
        Ok(RecipientSet::escalated(strategy, None, admin, super_admin))
    }

    /// Eligible admin of the organization and of its parent
    async fn admin_and_super_admin(
        &self,
        organization: &Organization,
        ctx: &SendContext,
    ) -> NotificationResult<(Option<Subject>, Option<Subject>)> {
        let admin = self
            .eligible_admin(organization, OrgRole::Admin, ctx)
            .await?;

        let super_admin = match organization.parent_organization_id {
            Some(parent_id) => match self.organization(parent_id).await? {
                Some(parent) => {
                    self.eligible_admin(&parent, OrgRole::SuperAdmin, ctx)
                        .await?
                }
                None => None,
            },
            None => None,
        };

        Ok((admin, super_admin))
    }

    async fn eligible_admin(
        &self,
        organization: &Organization,
        role: OrgRole,
        ctx: &SendContext,
    ) -> NotificationResult<Option<Subject>> {
        let Some(admin_id) = organization.admin_id else {
            return Ok(None);
        };

        let admin = self
            .account(SubjectType::OrgScoped(role), &SubjectRef::Numeric(admin_id))
            .await?;

        match admin {
            Some(admin) if self.passes(&admin, ctx).await => Ok(Some(admin)),
            _ => Ok(None),
        }
    }

    /// Per-template permission check used to decide eligibility
    async fn passes(&self, subject: &Subject, ctx: &SendContext) -> bool {
        self.gate
            .is_channel_enabled(
                subject,
                ctx.template_key(),
                ctx.templates.get(Channel::Email),
                Channel::Email,
            )
            .await
    }

    async fn owning_organization(&self, subject: &Subject) -> NotificationResult<Option<Organization>> {
        match subject.organization_id {
            Some(id) => self.organization(id).await,
            None => Ok(None),
        }
    }

    async fn account(
        &self,
        subject_type: SubjectType,
        id: &SubjectRef,
    ) -> NotificationResult<Option<Subject>> {
        self.directory
            .get_account(subject_type, id)
            .await
            .map_err(NotificationError::DirectoryLookup)
    }

    async fn organization(&self, id: i64) -> NotificationResult<Option<Organization>> {
        self.directory
            .get_organization(id)
            .await
            .map_err(NotificationError::DirectoryLookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NotificationTemplate, PermissionRecord, TemplatePair};
    use crate::notification::context::NotificationRequest;
    use crate::store::{MemoryDirectory, MemoryPermissionStore};

    const MEMBER: SubjectType = SubjectType::OrgScoped(OrgRole::Member);

    struct Fixture {
        directory: Arc<MemoryDirectory>,
        permissions: Arc<MemoryPermissionStore>,
        resolver: RecipientResolver,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(TemplateRegistry::default());
        let directory = Arc::new(MemoryDirectory::new());
        let permissions = Arc::new(MemoryPermissionStore::new());
        let gate = Arc::new(PermissionGate::new(registry.clone(), permissions.clone()));
        let resolver = RecipientResolver::new(registry, directory.clone(), gate);
        Fixture {
            directory,
            permissions,
            resolver,
        }
    }

    /// Org 10 (admin 2) under parent org 20 (admin 3), member 1 in org 10
    fn seed_hierarchy(directory: &MemoryDirectory, source: Option<&str>) {
        let mut org = Organization::new(10).with_admin(2).with_parent(20);
        if let Some(source) = source {
            org = org.with_source_tag(source);
        }
        directory.insert_organization(org);
        directory.insert_organization(Organization::new(20).with_admin(3));
        directory.insert_account(Subject::new(MEMBER, 1).with_organization(10));
        directory.insert_account(
            Subject::new(SubjectType::OrgScoped(OrgRole::Admin), 2).with_organization(10),
        );
        directory.insert_account(
            Subject::new(SubjectType::OrgScoped(OrgRole::SuperAdmin), 3).with_organization(20),
        );
    }

    fn ctx(key: &str, subject_id: i64) -> SendContext {
        let templates = TemplatePair {
            email: Some(NotificationTemplate::new(100, key, Channel::Email).editable(true)),
            push: None,
        };
        SendContext::new(NotificationRequest::new(MEMBER, subject_id, key), templates)
    }

    fn allow(permissions: &MemoryPermissionStore, subject_id: i64) {
        permissions.insert(PermissionRecord::new(subject_id, 100, Channel::Email, true));
        permissions.set_opt_in(subject_id, Channel::Email, true);
    }

    fn id_of(subject: Option<&Subject>) -> Option<i64> {
        subject.and_then(|s| s.id.account_id())
    }

    #[tokio::test]
    async fn test_concern_person_primary_with_admin_escalation() {
        let f = fixture();
        seed_hierarchy(&f.directory, None);
        allow(&f.permissions, 1);
        allow(&f.permissions, 2);
        allow(&f.permissions, 3);

        let set = f.resolver.resolve(&ctx("JobRenew", 1)).await.unwrap();

        assert_eq!(set.strategy(), ResolutionStrategy::ConcernPerson);
        assert_eq!(id_of(set.primary()), Some(1));
        assert_eq!(id_of(set.cc()), Some(2));
        assert_eq!(id_of(set.bcc()), Some(3));
    }

    #[tokio::test]
    async fn test_ineligible_concern_person_promotes_admin() {
        let f = fixture();
        seed_hierarchy(&f.directory, None);
        allow(&f.permissions, 2);
        allow(&f.permissions, 3);

        let set = f.resolver.resolve(&ctx("JobRenew", 1)).await.unwrap();

        assert_eq!(id_of(set.primary()), Some(2));
        assert_eq!(id_of(set.cc()), Some(3));
        assert!(set.bcc().is_none());
    }

    #[tokio::test]
    async fn test_disqualifying_source_never_yields_concern_person() {
        let f = fixture();
        seed_hierarchy(&f.directory, Some("rover"));
        allow(&f.permissions, 1);
        allow(&f.permissions, 2);

        let set = f.resolver.resolve(&ctx("ApplyOnJob", 1)).await.unwrap();

        assert_eq!(id_of(set.primary()), Some(2));
        assert_ne!(id_of(set.primary()), Some(1));
    }

    #[tokio::test]
    async fn test_super_admin_alone_becomes_primary() {
        let f = fixture();
        seed_hierarchy(&f.directory, None);
        allow(&f.permissions, 3);

        let set = f.resolver.resolve(&ctx("TransactionInvoice", 1)).await.unwrap();

        assert_eq!(set.strategy(), ResolutionStrategy::CompanyAdmin);
        assert_eq!(id_of(set.primary()), Some(3));
        assert!(set.cc().is_none());
    }

    #[tokio::test]
    async fn test_company_admin_never_uses_concern_person() {
        let f = fixture();
        seed_hierarchy(&f.directory, None);
        allow(&f.permissions, 1);

        let set = f.resolver.resolve(&ctx("TransactionInvoice", 1)).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_direct_strategy_for_individuals() {
        let f = fixture();
        f.directory.insert_account(Subject::new(SubjectType::Individual, 8));

        let templates = TemplatePair::default();
        let request = NotificationRequest::new(SubjectType::Individual, 8, "ApplyOnJob");
        let set = f
            .resolver
            .resolve(&SendContext::new(request, templates))
            .await
            .unwrap();

        assert_eq!(set.strategy(), ResolutionStrategy::Direct);
        assert_eq!(id_of(set.primary()), Some(8));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_empty() {
        let f = fixture();
        let set = f.resolver.resolve(&ctx("JobRenew", 404)).await.unwrap();
        assert!(set.is_empty());
    }
}
