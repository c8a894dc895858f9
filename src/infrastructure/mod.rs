//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `backoff`: Exponential backoff for delivery retries
//! - `config`: Application configuration and settings
//! - `error`: HTTP boundary error type
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL connection pool
//! - `redis`: Redis connectivity for the delivery queue

pub mod backoff;
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod redis;
