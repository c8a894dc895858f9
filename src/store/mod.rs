//! Repository interfaces for templates, permissions, accounts and inbox rows.
//!
//! The notification core only talks to these traits. Two implementations are
//! provided:
//!
//! - `memory`: DashMap-backed stores for tests and local development
//! - `postgres`: SQLx-backed stores reading the application database
//!
//! Use `create_stores()` to build the set matching the configuration.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Channel, NewInboxRecord, NotificationTemplate, Organization, PermissionRecord, Subject,
    SubjectRef, SubjectType,
};
use crate::postgres::PostgresPool;

pub use memory::{MemoryDirectory, MemoryInboxStore, MemoryPermissionStore, MemoryTemplateStore};
pub use postgres::{PgDirectory, PgInboxStore, PgPermissionStore, PgTemplateStore};

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Stored JSON could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row violated a column constraint
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Transaction was already finished
    #[error("Transaction closed")]
    TransactionClosed,

    /// Backend is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Lookup of email/push template records by key.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(
        &self,
        channel: Channel,
        key: &str,
    ) -> StoreResult<Option<NotificationTemplate>>;
}

/// Lookup of per-user notification switches.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// The user's record for one template on one channel, if any
    async fn get_permission(
        &self,
        subject_id: i64,
        template_id: i64,
        channel: Channel,
    ) -> StoreResult<Option<PermissionRecord>>;

    /// The user's account-wide switch for a channel
    async fn get_user_channel_opt_in(&self, subject_id: i64, channel: Channel) -> StoreResult<bool>;
}

/// Account and organization directory.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_account(
        &self,
        subject_type: SubjectType,
        id: &SubjectRef,
    ) -> StoreResult<Option<Subject>>;

    async fn get_organization(&self, id: i64) -> StoreResult<Option<Organization>>;
}

/// Transactional inbox storage.
///
/// Inserts happen inside an explicit transaction; nothing is visible until
/// `commit`, and `rollback` (or dropping the transaction) discards staged rows.
#[async_trait]
pub trait InboxRecordStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn InboxTransaction>>;
}

/// A single open inbox transaction.
#[async_trait]
pub trait InboxTransaction: Send {
    /// Stage a row, returning its id
    async fn insert(&mut self, record: &NewInboxRecord) -> StoreResult<i64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// The full set of stores used by the notification service
#[derive(Clone)]
pub struct Stores {
    pub templates: Arc<dyn TemplateStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub directory: Arc<dyn Directory>,
    pub inbox: Arc<dyn InboxRecordStore>,
}

impl Stores {
    /// Empty in-memory stores
    pub fn memory() -> Self {
        Self {
            templates: Arc::new(MemoryTemplateStore::new()),
            permissions: Arc::new(MemoryPermissionStore::new()),
            directory: Arc::new(MemoryDirectory::new()),
            inbox: Arc::new(MemoryInboxStore::new()),
        }
    }
}

/// Create the store set for the configured backend.
///
/// Returns PostgreSQL stores when a pool is provided, otherwise empty
/// in-memory stores.
pub fn create_stores(postgres_pool: Option<Arc<PostgresPool>>) -> Stores {
    match postgres_pool {
        Some(pool) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL stores");
            let pg = pool.pool().clone();
            Stores {
                templates: Arc::new(PgTemplateStore::new(pg.clone())),
                permissions: Arc::new(PgPermissionStore::new(pg.clone())),
                directory: Arc::new(PgDirectory::new(pg.clone())),
                inbox: Arc::new(PgInboxStore::new(pg)),
            }
        }
        None => {
            tracing::warn!(
                backend = "memory",
                "No database configured, using empty in-memory stores"
            );
            Stores::memory()
        }
    }
}
