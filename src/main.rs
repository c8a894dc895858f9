use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use system_notifications::config::{LoggingConfig, Settings};
use system_notifications::delivery::{create_providers, create_task_queue, spawn_workers};
use system_notifications::infrastructure::redis as redis_conn;
use system_notifications::postgres::PostgresPool;
use system_notifications::server::{create_app, AppState};
use system_notifications::store::create_stores;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    init_tracing(&settings.logging);
    tracing::info!(
        environment = ?settings.delivery.environment,
        "Configuration loaded"
    );

    // PostgreSQL is optional; without it the stores live in memory
    let postgres_pool = match settings.database.url {
        Some(_) => Some(Arc::new(PostgresPool::new(&settings.database).await?)),
        None => None,
    };
    let stores = create_stores(postgres_pool.clone());

    // Delivery queue, providers and workers
    let redis = redis_conn::connect(&settings.redis).await?;
    let queue = create_task_queue(&settings.queue, redis.clone());
    let (email_provider, push_provider) = create_providers(&settings)?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let workers = spawn_workers(
        &settings.queue,
        queue.clone(),
        email_provider,
        push_provider,
        &shutdown_tx,
    );

    // Create application state
    let addr = settings.server_addr();
    let state = AppState::new(settings, &stores, queue, postgres_pool.clone(), redis);
    tracing::info!("Application state initialized");

    let app = create_app(state);

    // Start server
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for delivery workers to finish their current task
    tracing::info!("Waiting for delivery workers to finish...");
    for handle in workers {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Delivery worker panicked");
        }
    }

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop delivery workers
    let _ = shutdown_tx.send(());
}
