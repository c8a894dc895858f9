use std::sync::Arc;
use std::time::Instant;

use redis::aio::ConnectionManager;

use crate::config::Settings;
use crate::delivery::DeliveryTaskQueue;
use crate::notification::NotificationOrchestrator;
use crate::postgres::PostgresPool;
use crate::store::Stores;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub orchestrator: Arc<NotificationOrchestrator>,
    pub queue: Arc<dyn DeliveryTaskQueue>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub redis: Option<ConnectionManager>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        stores: &Stores,
        queue: Arc<dyn DeliveryTaskQueue>,
        postgres_pool: Option<Arc<PostgresPool>>,
        redis: Option<ConnectionManager>,
    ) -> Self {
        let orchestrator = Arc::new(NotificationOrchestrator::from_settings(
            &settings,
            stores,
            queue.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            orchestrator,
            queue,
            postgres_pool,
            redis,
            start_time: Instant::now(),
        }
    }
}
