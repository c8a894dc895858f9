//! Fixed catalog of template categories.
//!
//! Every rule that depends on a template key (recipient strategy, permission
//! overrides, escalation, CC overrides, admin broadcast list) is looked up
//! here instead of being branched on at call sites.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::TemplateSettings;

/// How recipients are chosen for a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The individual tied to the event, escalating to organization admins
    ConcernPerson,
    /// The organization's admin, escalating to the parent organization's admin
    CompanyAdmin,
    /// The subject alone
    Direct,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::ConcernPerson => "concern_person",
            ResolutionStrategy::CompanyAdmin => "company_admin",
            ResolutionStrategy::Direct => "direct",
        }
    }
}

/// How the email CC list is overridden for a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcDirective {
    /// Use the resolver's escalation contacts
    Resolved,
    /// Replace CC with the partner-confirmation mailbox
    PartnerConfirmation,
    /// Send with no resolver CC at all
    Cleared,
}

/// Distribution list used for admin-broadcast sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminList {
    Management,
    HigherManagement,
    Report,
}

const CONCERN_PERSON_TEMPLATES: &[&str] = &[
    "JobAboutToRenew",
    "JobRenew",
    "JobAboutToExpired",
    "FeaturedJobExpired",
    "ApplyOnJob",
];

const COMPANY_ADMIN_TEMPLATES: &[&str] = &[
    "TransactionInvoice",
    "SubcriptionAboutToRenew",
    "FoundationPackageSubscribe",
    "SubscriptionAboutToExpired",
    "AppliedJob",
    "ViewedJob",
    "SubscriptionExpired",
    "SubscriptionRenew",
    "FreeSubscription",
    "CancelSubscription",
    "PlanReSubscription",
    "SubscriptionRenewFailed",
    "JobExpiredGrouped",
    "FoundationSubscriptionRenewFailed",
];

const EXCEPTIONAL_TEMPLATES: &[&str] = &[
    "ForgotPassword",
    "ResetPassword",
    "VerifyEmail",
    "OtpVerification",
];

const PERMISSION_BYPASS_TEMPLATES: &[&str] = &["ApplyOnJobExternal"];

const ESCALATION_REQUIRED_TEMPLATES: &[&str] = &["ApplyOnJob", "ApplyOnJobExternal"];

const PARTNER_CONFIRMATION_TEMPLATES: &[&str] =
    &["AggregationPartnerConfirmation", "EnterprisePartnerConfirmation"];

const CC_CLEARED_TEMPLATES: &[&str] = &["AggregationPartner"];

const DISQUALIFYING_SOURCES: &[&str] = &["rover"];

fn key_set(keys: &[&str]) -> HashSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

/// Template key catalog
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    strategies: HashMap<String, ResolutionStrategy>,
    exceptional: HashSet<String>,
    permission_bypass: HashSet<String>,
    escalation_required: HashSet<String>,
    partner_confirmation: HashSet<String>,
    cc_cleared: HashSet<String>,
    admin_lists: HashMap<String, AdminList>,
    disqualifying_sources: HashSet<String>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        let mut strategies = HashMap::new();
        for key in CONCERN_PERSON_TEMPLATES {
            strategies.insert(key.to_string(), ResolutionStrategy::ConcernPerson);
        }
        for key in COMPANY_ADMIN_TEMPLATES {
            strategies.insert(key.to_string(), ResolutionStrategy::CompanyAdmin);
        }

        let mut admin_lists = HashMap::new();
        admin_lists.insert("AppliedOnRoverJob".to_string(), AdminList::HigherManagement);
        admin_lists.insert("DailyReportRover".to_string(), AdminList::Report);

        Self {
            strategies,
            exceptional: key_set(EXCEPTIONAL_TEMPLATES),
            permission_bypass: key_set(PERMISSION_BYPASS_TEMPLATES),
            escalation_required: key_set(ESCALATION_REQUIRED_TEMPLATES),
            partner_confirmation: key_set(PARTNER_CONFIRMATION_TEMPLATES),
            cc_cleared: key_set(CC_CLEARED_TEMPLATES),
            admin_lists,
            disqualifying_sources: key_set(DISQUALIFYING_SOURCES),
        }
    }
}

impl TemplateRegistry {
    /// Build the catalog from defaults plus configured additions
    pub fn from_settings(settings: &TemplateSettings) -> Self {
        let mut registry = Self::default();

        for key in &settings.concern_person {
            registry
                .strategies
                .insert(key.clone(), ResolutionStrategy::ConcernPerson);
        }
        for key in &settings.company_admin {
            registry
                .strategies
                .insert(key.clone(), ResolutionStrategy::CompanyAdmin);
        }
        registry.exceptional.extend(settings.exceptional.iter().cloned());
        registry
            .permission_bypass
            .extend(settings.permission_bypass.iter().cloned());
        registry
            .escalation_required
            .extend(settings.escalation_required.iter().cloned());

        if !settings.disqualifying_sources.is_empty() {
            registry.disqualifying_sources = settings
                .disqualifying_sources
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect();
        }

        tracing::debug!(
            strategies = registry.strategies.len(),
            exceptional = registry.exceptional.len(),
            "Template registry built"
        );

        registry
    }

    /// Recipient strategy for a template key (`Direct` when unregistered)
    pub fn strategy(&self, template_key: &str) -> ResolutionStrategy {
        self.strategies
            .get(template_key)
            .copied()
            .unwrap_or(ResolutionStrategy::Direct)
    }

    /// Templates that always send email and never push
    pub fn is_exceptional(&self, template_key: &str) -> bool {
        self.exceptional.contains(template_key)
    }

    /// Templates that skip permission checks entirely
    pub fn bypasses_permission(&self, template_key: &str) -> bool {
        self.permission_bypass.contains(template_key)
    }

    /// Templates whose email is always BCC'd to higher management
    pub fn requires_escalation(&self, template_key: &str) -> bool {
        self.escalation_required.contains(template_key)
    }

    pub fn cc_directive(&self, template_key: &str) -> CcDirective {
        if self.partner_confirmation.contains(template_key) {
            CcDirective::PartnerConfirmation
        } else if self.cc_cleared.contains(template_key) {
            CcDirective::Cleared
        } else {
            CcDirective::Resolved
        }
    }

    pub fn admin_list(&self, template_key: &str) -> AdminList {
        self.admin_lists
            .get(template_key)
            .copied()
            .unwrap_or(AdminList::Management)
    }

    /// Whether an organization source tag rules out concern-person routing
    pub fn is_disqualifying_source(&self, source_tag: Option<&str>) -> bool {
        source_tag
            .map(|tag| self.disqualifying_sources.contains(&tag.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}
