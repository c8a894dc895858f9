//! PostgreSQL-backed store implementations.
//!
//! Tables read by these stores:
//! - `notification_templates` - email/push template records
//! - `notification_permissions` - per-user, per-template channel switches
//! - `channel_opt_ins` - account-wide channel switches
//! - `accounts`, `device_tokens`, `organizations` - directory
//! - `user_notifications` - in-app inbox rows written for push sends

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    Channel, NewInboxRecord, NotificationTemplate, Organization, PermissionRecord, PublishState,
    Subject, SubjectRef, SubjectType,
};

use super::{
    Directory, InboxRecordStore, InboxTransaction, PermissionStore, StoreResult, TemplateStore,
};

/// Template store reading `notification_templates`.
pub struct PgTemplateStore {
    pool: PgPool,
}

impl PgTemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn get_template(
        &self,
        channel: Channel,
        key: &str,
    ) -> StoreResult<Option<NotificationTemplate>> {
        let row: Option<(i64, String, Option<String>, bool, bool, String)> = sqlx::query_as(
            r#"
            SELECT id, title, body, editable_by_user, globally_enabled, publish_state
            FROM notification_templates
            WHERE channel = $1 AND key = $2
            LIMIT 1
            "#,
        )
        .bind(channel.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, title, body, editable_by_user, globally_enabled, publish_state)| {
                NotificationTemplate {
                    id,
                    key: key.to_string(),
                    channel,
                    title,
                    body: body.unwrap_or_default(),
                    editable_by_user,
                    globally_enabled,
                    publish_state: parse_publish_state(&publish_state),
                }
            },
        ))
    }
}

fn parse_publish_state(value: &str) -> PublishState {
    match value.to_ascii_lowercase().as_str() {
        "published" | "publish" => PublishState::Published,
        _ => PublishState::Draft,
    }
}

/// Permission store reading `notification_permissions` and `channel_opt_ins`.
pub struct PgPermissionStore {
    pool: PgPool,
}

impl PgPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn get_permission(
        &self,
        subject_id: i64,
        template_id: i64,
        channel: Channel,
    ) -> StoreResult<Option<PermissionRecord>> {
        let row: Option<(bool,)> = sqlx::query_as(
            r#"
            SELECT explicitly_enabled
            FROM notification_permissions
            WHERE subject_id = $1 AND template_id = $2 AND channel = $3
            LIMIT 1
            "#,
        )
        .bind(subject_id)
        .bind(template_id)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(enabled,)| PermissionRecord::new(subject_id, template_id, channel, enabled)))
    }

    async fn get_user_channel_opt_in(&self, subject_id: i64, channel: Channel) -> StoreResult<bool> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT enabled FROM channel_opt_ins WHERE subject_id = $1 AND channel = $2",
        )
        .bind(subject_id)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(enabled,)| enabled).unwrap_or(false))
    }
}

/// Directory reading `accounts`, `device_tokens` and `organizations`.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type AccountRow = (
    i64,
    String,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
);

#[async_trait]
impl Directory for PgDirectory {
    async fn get_account(
        &self,
        subject_type: SubjectType,
        id: &SubjectRef,
    ) -> StoreResult<Option<Subject>> {
        let Some(account_id) = id.account_id() else {
            tracing::debug!(subject_id = %id, "Non-numeric subject id, skipping directory lookup");
            return Ok(None);
        };

        let account_class = if subject_type.is_org_scoped() {
            "organization"
        } else {
            "individual"
        };

        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.role, a.organization_id, o.parent_organization_id,
                   COALESCE(a.source_tag, o.source_tag), a.email, a.legacy_device_token
            FROM accounts a
            LEFT JOIN organizations o ON o.id = a.organization_id
            WHERE a.id = $1 AND a.account_class = $2
            "#,
        )
        .bind(account_id)
        .bind(account_class)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, role, organization_id, parent_organization_id, source_tag, email, legacy)) =
            row
        else {
            return Ok(None);
        };

        let tokens: Vec<(String,)> = sqlx::query_as(
            "SELECT token FROM device_tokens WHERE account_id = $1 ORDER BY created_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let stored_type = role.parse::<SubjectType>().unwrap_or_else(|e| {
            tracing::warn!(account_id = id, error = %e, "Unknown account role, using requested type");
            subject_type
        });

        Ok(Some(Subject {
            subject_type: stored_type,
            id: SubjectRef::Numeric(id),
            organization_id,
            parent_organization_id,
            source_tag,
            email,
            device_tokens: tokens.into_iter().map(|(t,)| t).collect(),
            legacy_device_token: legacy.filter(|t| !t.is_empty()),
        }))
    }

    async fn get_organization(&self, id: i64) -> StoreResult<Option<Organization>> {
        let row: Option<(i64, Option<i64>, Option<i64>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, admin_id, parent_organization_id, source_tag
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, admin_id, parent_organization_id, source_tag)| Organization {
            id,
            admin_id,
            parent_organization_id,
            source_tag,
        }))
    }
}

/// Inbox store writing `user_notifications` inside a database transaction.
pub struct PgInboxStore {
    pool: PgPool,
}

impl PgInboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InboxRecordStore for PgInboxStore {
    async fn begin(&self) -> StoreResult<Box<dyn InboxTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgInboxTransaction { tx }))
    }
}

struct PgInboxTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InboxTransaction for PgInboxTransaction {
    async fn insert(&mut self, record: &NewInboxRecord) -> StoreResult<i64> {
        let created_at: DateTime<Utc> = record.created_at;
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO user_notifications
                (title, message, source, destination, user_id, reference_id, payload,
                 is_read, notification_template_id, notification_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING id
            "#,
        )
        .bind(&record.title)
        .bind(&record.body)
        .bind(&record.source)
        .bind(record.destination.as_str())
        .bind(record.user_id)
        .bind(&record.reference_id)
        .bind(&record.payload)
        .bind(record.is_read)
        .bind(record.template_id)
        .bind(&record.template_key)
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_publish_state() {
        assert_eq!(parse_publish_state("Publish"), PublishState::Published);
        assert_eq!(parse_publish_state("published"), PublishState::Published);
        assert_eq!(parse_publish_state("Draft"), PublishState::Draft);
        assert_eq!(parse_publish_state("archived"), PublishState::Draft);
    }
}
