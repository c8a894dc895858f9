//! In-memory store implementations using DashMap.
//!
//! Data lives only as long as the process. These stores back the test suite
//! and local runs without a database.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{
    Channel, InboxRecord, NewInboxRecord, NotificationTemplate, Organization, PermissionRecord,
    Subject, SubjectRef, SubjectType,
};

use super::{
    Directory, InboxRecordStore, InboxTransaction, PermissionStore, StoreError, StoreResult,
    TemplateStore,
};

/// Maximum inbox title length, mirroring the `VARCHAR(255)` column
pub const MAX_INBOX_TITLE_LEN: usize = 255;

/// In-memory template store keyed by (channel, key).
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: DashMap<(Channel, String), NotificationTemplate>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a template
    pub fn insert(&self, template: NotificationTemplate) {
        self.templates
            .insert((template.channel, template.key.clone()), template);
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn get_template(
        &self,
        channel: Channel,
        key: &str,
    ) -> StoreResult<Option<NotificationTemplate>> {
        Ok(self
            .templates
            .get(&(channel, key.to_string()))
            .map(|t| t.clone()))
    }
}

/// In-memory permission store.
#[derive(Default)]
pub struct MemoryPermissionStore {
    records: DashMap<(i64, i64, Channel), PermissionRecord>,
    opt_ins: DashMap<(i64, Channel), bool>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a permission record
    pub fn insert(&self, record: PermissionRecord) {
        self.records.insert(
            (record.subject_id, record.template_id, record.channel),
            record,
        );
    }

    /// Set a user's account-wide channel switch
    pub fn set_opt_in(&self, subject_id: i64, channel: Channel, enabled: bool) {
        self.opt_ins.insert((subject_id, channel), enabled);
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn get_permission(
        &self,
        subject_id: i64,
        template_id: i64,
        channel: Channel,
    ) -> StoreResult<Option<PermissionRecord>> {
        Ok(self
            .records
            .get(&(subject_id, template_id, channel))
            .map(|r| r.clone()))
    }

    async fn get_user_channel_opt_in(&self, subject_id: i64, channel: Channel) -> StoreResult<bool> {
        Ok(self
            .opt_ins
            .get(&(subject_id, channel))
            .map(|v| *v)
            .unwrap_or(false))
    }
}

/// In-memory account directory.
///
/// Individual and organization-scoped accounts live in separate id spaces;
/// lookups ignore the organization role.
#[derive(Default)]
pub struct MemoryDirectory {
    accounts: DashMap<(bool, SubjectRef), Subject>,
    organizations: DashMap<i64, Organization>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&self, subject: Subject) {
        self.accounts.insert(
            (subject.subject_type.is_org_scoped(), subject.id.clone()),
            subject,
        );
    }

    pub fn insert_organization(&self, organization: Organization) {
        self.organizations.insert(organization.id, organization);
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn get_account(
        &self,
        subject_type: SubjectType,
        id: &SubjectRef,
    ) -> StoreResult<Option<Subject>> {
        Ok(self
            .accounts
            .get(&(subject_type.is_org_scoped(), id.clone()))
            .map(|s| s.clone()))
    }

    async fn get_organization(&self, id: i64) -> StoreResult<Option<Organization>> {
        Ok(self.organizations.get(&id).map(|o| o.clone()))
    }
}

/// In-memory inbox store with staged transactions.
pub struct MemoryInboxStore {
    rows: Arc<DashMap<i64, InboxRecord>>,
    next_id: Arc<AtomicI64>,
}

impl Default for MemoryInboxStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInboxStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Number of committed rows
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Committed rows for a user, oldest first
    pub fn records_for(&self, user_id: i64) -> Vec<InboxRecord> {
        let mut records: Vec<InboxRecord> = self
            .rows
            .iter()
            .filter(|entry| entry.value().record.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }
}

#[async_trait]
impl InboxRecordStore for MemoryInboxStore {
    async fn begin(&self) -> StoreResult<Box<dyn InboxTransaction>> {
        Ok(Box::new(MemoryInboxTransaction {
            rows: self.rows.clone(),
            next_id: self.next_id.clone(),
            staged: Vec::new(),
        }))
    }
}

struct MemoryInboxTransaction {
    rows: Arc<DashMap<i64, InboxRecord>>,
    next_id: Arc<AtomicI64>,
    staged: Vec<InboxRecord>,
}

fn check_constraints(record: &NewInboxRecord) -> StoreResult<()> {
    if record.title.chars().count() > MAX_INBOX_TITLE_LEN {
        return Err(StoreError::Constraint(format!(
            "title exceeds {} characters",
            MAX_INBOX_TITLE_LEN
        )));
    }
    if record.user_id <= 0 {
        return Err(StoreError::Constraint("user_id must be positive".to_string()));
    }
    Ok(())
}

#[async_trait]
impl InboxTransaction for MemoryInboxTransaction {
    async fn insert(&mut self, record: &NewInboxRecord) -> StoreResult<i64> {
        check_constraints(record)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.staged.push(InboxRecord {
            id,
            record: record.clone(),
        });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let count = self.staged.len();
        for row in self.staged {
            self.rows.insert(row.id, row);
        }
        tracing::trace!(rows = count, "Committed in-memory inbox transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        tracing::trace!(
            rows = self.staged.len(),
            "Rolled back in-memory inbox transaction"
        );
        Ok(())
    }
}
