//! Prometheus metrics for the notification service.
//!
//! This module provides metrics for monitoring the notification pipeline:
//! - Request outcomes (done, no-op, failed)
//! - Recipient resolution by strategy
//! - Channel gate decisions
//! - Delivery tasks enqueued and delivery attempts
//! - Inbox writes

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, PipelineMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "sysnotify";

lazy_static! {
    // ============================================================================
    // Pipeline Metrics
    // ============================================================================

    /// Notification requests by final outcome
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_total", METRIC_PREFIX),
        "Notification requests by outcome",
        &["outcome"]
    ).unwrap();

    /// Recipient resolutions by strategy and result
    pub static ref RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_resolutions_total", METRIC_PREFIX),
        "Recipient resolutions by strategy and result",
        &["strategy", "result"]
    ).unwrap();

    /// Channel gate decisions
    pub static ref GATE_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_gate_decisions_total", METRIC_PREFIX),
        "Channel gate decisions",
        &["channel", "decision"]
    ).unwrap();

    /// Inbox record writes by result
    pub static ref INBOX_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_inbox_writes_total", METRIC_PREFIX),
        "Inbox record writes by result",
        &["result"]
    ).unwrap();

    /// Time spent resolving, gating and enqueueing one notification
    pub static ref PIPELINE_LATENCY: Histogram = register_histogram!(
        format!("{}_pipeline_latency_seconds", METRIC_PREFIX),
        "Notification pipeline latency in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Delivery tasks handed to the queue
    pub static ref TASKS_ENQUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tasks_enqueued_total", METRIC_PREFIX),
        "Delivery tasks enqueued",
        &["channel"]
    ).unwrap();

    /// Delivery task enqueue failures
    pub static ref TASKS_ENQUEUE_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tasks_enqueue_failed_total", METRIC_PREFIX),
        "Delivery task enqueue failures",
        &["channel"]
    ).unwrap();

    /// Delivery attempts executed by workers
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_attempts_total", METRIC_PREFIX),
        "Delivery attempts by channel and result",
        &["channel", "result"]
    ).unwrap();

    /// Push tokens delivered or failed
    pub static ref PUSH_TOKENS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_push_tokens_total", METRIC_PREFIX),
        "Push tokens by result",
        &["result"]
    ).unwrap();

    /// Tasks currently waiting in the in-memory queue
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Delivery tasks waiting in the queue"
    ).unwrap();
}
