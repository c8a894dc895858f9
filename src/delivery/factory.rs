//! Task queue factory

use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::config::QueueConfig;

use super::backend::DeliveryTaskQueue;
use super::memory_backend::MemoryTaskQueue;
use super::redis_backend::RedisTaskQueue;

/// Create a delivery task queue based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend` setting:
/// - `"redis"`: Returns a `RedisTaskQueue` if a Redis connection is provided
/// - `"memory"` (default): Returns a `MemoryTaskQueue`
///
/// # Example
///
/// ```rust,ignore
/// let queue = create_task_queue(&settings.queue, redis_connection.clone());
/// ```
pub fn create_task_queue(
    settings: &QueueConfig,
    redis_connection: Option<ConnectionManager>,
) -> Arc<dyn DeliveryTaskQueue> {
    match settings.backend.as_str() {
        "redis" => {
            if let Some(connection) = redis_connection {
                tracing::info!(
                    backend = "redis",
                    key = %settings.redis_key,
                    "Creating Redis task queue"
                );
                Arc::new(RedisTaskQueue::new(connection, settings.redis_key.clone()))
            } else {
                tracing::warn!(
                    "Redis task queue requested but no connection provided, falling back to memory"
                );
                Arc::new(MemoryTaskQueue::new())
            }
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating in-memory task queue");
            Arc::new(MemoryTaskQueue::new())
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown task queue backend, falling back to memory"
            );
            Arc::new(MemoryTaskQueue::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_selected_by_default() {
        let queue = create_task_queue(&QueueConfig::default(), None);
        assert_eq!(queue.backend_name(), "memory");
    }

    #[test]
    fn test_redis_without_connection_falls_back() {
        let config = QueueConfig {
            backend: "redis".to_string(),
            ..Default::default()
        };
        let queue = create_task_queue(&config, None);
        assert_eq!(queue.backend_name(), "memory");
    }
}
