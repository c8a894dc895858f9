//! Redis connectivity.
//!
//! The delivery queue keeps its tasks in a Redis list when the `redis` queue
//! backend is selected. `ConnectionManager` reconnects on its own, so callers
//! simply clone the handle.

use redis::aio::ConnectionManager;
use redis::RedisError;

use crate::config::RedisConfig;

/// Open a managed connection to the configured Redis server.
pub async fn connect(config: &RedisConfig) -> Result<Option<ConnectionManager>, RedisError> {
    let Some(url) = config.url.as_deref() else {
        return Ok(None);
    };

    let client = redis::Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;
    tracing::info!("Redis connection established");

    Ok(Some(manager))
}

/// Check that Redis answers a PING.
pub async fn ping(connection: &ConnectionManager) -> Result<(), RedisError> {
    let mut conn = connection.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(())
}
