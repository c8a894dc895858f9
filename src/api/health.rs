//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::infrastructure::redis as redis_conn;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisHealthResponse>,
    pub queue: QueueHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<usize>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let postgres = match &state.postgres_pool {
        Some(pool) => {
            let connected = pool.ping().await.is_ok();
            let (pool_size, idle_connections) = pool.stats();
            Some(PostgresHealthResponse {
                connected,
                pool_size,
                idle_connections,
            })
        }
        None => None,
    };

    let redis = match &state.redis {
        Some(connection) => Some(RedisHealthResponse {
            connected: redis_conn::ping(connection).await.is_ok(),
        }),
        None => None,
    };

    let pending = match state.queue.len().await {
        Ok(len) => Some(len),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read delivery queue length");
            None
        }
    };

    let healthy = postgres.as_ref().map_or(true, |p| p.connected)
        && redis.as_ref().map_or(true, |r| r.connected)
        && pending.is_some();
    let status = if healthy { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        postgres,
        redis,
        queue: QueueHealthResponse {
            backend: state.queue.backend_name().to_string(),
            pending,
        },
    })
}
