//! Accounts and organizations targeted by a notification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of an organization-scoped account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Member,
    Admin,
    SuperAdmin,
}

/// Kind of account a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SubjectType {
    /// A standalone account with no organization hierarchy
    Individual,
    /// An account that belongs to an organization
    OrgScoped(OrgRole),
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Individual => "individual",
            SubjectType::OrgScoped(OrgRole::Member) => "member",
            SubjectType::OrgScoped(OrgRole::Admin) => "admin",
            SubjectType::OrgScoped(OrgRole::SuperAdmin) => "super_admin",
        }
    }

    pub fn is_org_scoped(&self) -> bool {
        matches!(self, SubjectType::OrgScoped(_))
    }
}

#[derive(Debug, Error)]
#[error("Unknown subject type: {0}")]
pub struct UnknownSubjectType(pub String);

impl FromStr for SubjectType {
    type Err = UnknownSubjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "individual" => Ok(SubjectType::Individual),
            "member" => Ok(SubjectType::OrgScoped(OrgRole::Member)),
            "admin" => Ok(SubjectType::OrgScoped(OrgRole::Admin)),
            "super_admin" | "superadmin" => Ok(SubjectType::OrgScoped(OrgRole::SuperAdmin)),
            _ => Err(UnknownSubjectType(s.to_string())),
        }
    }
}

impl TryFrom<String> for SubjectType {
    type Error = UnknownSubjectType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubjectType> for String {
    fn from(value: SubjectType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a subject as supplied by the caller.
///
/// Only `Numeric` identities are concrete account ids; permission lookups and
/// push delivery are skipped for anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectRef {
    Numeric(i64),
    Opaque(String),
}

impl SubjectRef {
    /// The concrete account id, if this is one
    pub fn account_id(&self) -> Option<i64> {
        match self {
            SubjectRef::Numeric(id) => Some(*id),
            SubjectRef::Opaque(_) => None,
        }
    }
}

impl From<i64> for SubjectRef {
    fn from(id: i64) -> Self {
        SubjectRef::Numeric(id)
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectRef::Numeric(id) => write!(f, "{}", id),
            SubjectRef::Opaque(s) => f.write_str(s),
        }
    }
}

/// An account loaded from the directory for one resolution pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub subject_type: SubjectType,
    pub id: SubjectRef,
    /// Organization the account belongs to (or represents)
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default)]
    pub parent_organization_id: Option<i64>,
    /// Where the account originated (e.g. "native", "rover")
    #[serde(default)]
    pub source_tag: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Push tokens registered per device session
    #[serde(default)]
    pub device_tokens: Vec<String>,
    /// Single token stored on the account itself by older clients
    #[serde(default)]
    pub legacy_device_token: Option<String>,
}

impl Subject {
    pub fn new(subject_type: SubjectType, id: impl Into<SubjectRef>) -> Self {
        Self {
            subject_type,
            id: id.into(),
            organization_id: None,
            parent_organization_id: None,
            source_tag: None,
            email: None,
            device_tokens: Vec::new(),
            legacy_device_token: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_organization(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_device_tokens(mut self, tokens: Vec<String>) -> Self {
        self.device_tokens = tokens;
        self
    }

    pub fn with_legacy_token(mut self, token: impl Into<String>) -> Self {
        self.legacy_device_token = Some(token.into());
        self
    }

    /// Email address on file, ignoring blank values
    pub fn email_address(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

/// Organization record as seen by recipient resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    #[serde(default)]
    pub admin_id: Option<i64>,
    #[serde(default)]
    pub parent_organization_id: Option<i64>,
    #[serde(default)]
    pub source_tag: Option<String>,
}

impl Organization {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            admin_id: None,
            parent_organization_id: None,
            source_tag: None,
        }
    }

    pub fn with_admin(mut self, admin_id: i64) -> Self {
        self.admin_id = Some(admin_id);
        self
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_organization_id = Some(parent_id);
        self
    }

    pub fn with_source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = Some(tag.into());
        self
    }
}
