// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules; Redis connectivity stays under
// `infrastructure::redis` so it does not shadow the `redis` crate.
pub use infrastructure::backoff;
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;

// Domain layer (business logic)
pub mod domain;
pub mod notification;
pub mod store;

// Delivery (queue, workers, providers)
pub mod delivery;

// Application layer
pub mod api;
pub mod server;
