//! PostgreSQL persistence module.
//!
//! Provides the connection pool used by the PostgreSQL stores.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
