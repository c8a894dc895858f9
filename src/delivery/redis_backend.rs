//! Redis-backed delivery task queue.
//!
//! Tasks are JSON documents in a Redis list: producers `LPUSH`, workers
//! `BRPOP`, which gives FIFO order across any number of service instances.
//! Retries that are not yet due wait in a sorted set (`<key>:delayed`) scored
//! by due time in milliseconds, and are moved onto the list by whichever
//! worker polls first after they fall due. A task popped by a worker that
//! crashes before finishing is lost.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::backend::{DeliveryTaskQueue, QueueError};
use super::task::QueuedTask;

/// Longest a `BRPOP` blocks, so delayed retries are promoted promptly
const DELAYED_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Move due members of the delayed set onto the ready list atomically
const PROMOTE_DUE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, payload in ipairs(due) do
    redis.call('ZREM', KEYS[2], payload)
    redis.call('LPUSH', KEYS[1], payload)
end
return #due
"#;

/// Redis list queue with a delayed-retry set
pub struct RedisTaskQueue {
    connection: ConnectionManager,
    key: String,
    delayed_key: String,
}

impl RedisTaskQueue {
    pub fn new(connection: ConnectionManager, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            connection,
            delayed_key: delayed_key(&key),
            key,
        }
    }

    async fn promote_due(&self, conn: &mut ConnectionManager) -> Result<(), QueueError> {
        let promoted: usize = redis::Script::new(PROMOTE_DUE_SCRIPT)
            .key(&self.key)
            .key(&self.delayed_key)
            .arg(due_score(Utc::now()))
            .invoke_async(conn)
            .await?;

        if promoted > 0 {
            tracing::debug!(key = %self.key, promoted, "Promoted due delivery retries");
        }
        Ok(())
    }
}

fn delayed_key(key: &str) -> String {
    format!("{}:delayed", key)
}

fn due_score(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

#[async_trait]
impl DeliveryTaskQueue for RedisTaskQueue {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn push(&self, task: QueuedTask) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&task)?;
        let mut conn = self.connection.clone();

        match task.not_before {
            Some(due) if !task.is_due(Utc::now()) => {
                let _: () = conn.zadd(&self.delayed_key, payload, due_score(due)).await?;
            }
            _ => {
                let _: () = conn.lpush(&self.key, payload).await?;
            }
        }
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<QueuedTask>, QueueError> {
        let mut conn = self.connection.clone();
        self.promote_due(&mut conn).await?;

        let wait = timeout.min(DELAYED_POLL_INTERVAL);
        let popped: Option<(String, String)> = conn.brpop(&self.key, wait.as_secs_f64()).await?;

        let Some((_, payload)) = popped else {
            return Ok(None);
        };

        match serde_json::from_str::<QueuedTask>(&payload) {
            Ok(task) => Ok(Some(task)),
            Err(e) => {
                // Undecodable entries would block the queue forever if re-pushed
                tracing::warn!(
                    key = %self.key,
                    error = %e,
                    "Dropping undecodable delivery task"
                );
                Err(QueueError::Serialization(e))
            }
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection.clone();
        let ready: usize = conn.llen(&self.key).await?;
        let delayed: usize = conn.zcard(&self.delayed_key).await?;
        Ok(ready + delayed)
    }
}
