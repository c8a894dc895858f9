//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::domain::Channel;

use super::{
    DELIVERY_ATTEMPTS_TOTAL, GATE_DECISIONS_TOTAL, INBOX_WRITES_TOTAL, NOTIFICATIONS_TOTAL,
    PIPELINE_LATENCY, PUSH_TOKENS_TOTAL, QUEUE_DEPTH, RESOLUTIONS_TOTAL, TASKS_ENQUEUED_TOTAL,
    TASKS_ENQUEUE_FAILED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording request-path metrics
pub struct PipelineMetrics;

impl PipelineMetrics {
    /// Record the final outcome of a notification request
    pub fn record_outcome(outcome: &str) {
        NOTIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a recipient resolution
    pub fn record_resolution(strategy: &str, resolved: bool) {
        let result = if resolved { "resolved" } else { "unresolved" };
        RESOLUTIONS_TOTAL.with_label_values(&[strategy, result]).inc();
    }

    /// Record a gate decision for one channel
    pub fn record_gate(channel: Channel, enabled: bool) {
        let decision = if enabled { "enabled" } else { "disabled" };
        GATE_DECISIONS_TOTAL
            .with_label_values(&[channel.as_str(), decision])
            .inc();
    }

    /// Record an inbox write
    pub fn record_inbox_write(success: bool) {
        let result = if success { "committed" } else { "rolled_back" };
        INBOX_WRITES_TOTAL.with_label_values(&[result]).inc();
    }

    /// Record pipeline latency in seconds
    pub fn record_latency(seconds: f64) {
        PIPELINE_LATENCY.observe(seconds);
    }
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record a task handed to the queue
    pub fn record_enqueued(channel: Channel) {
        TASKS_ENQUEUED_TOTAL
            .with_label_values(&[channel.as_str()])
            .inc();
    }

    /// Record a failed enqueue
    pub fn record_enqueue_failed(channel: Channel) {
        TASKS_ENQUEUE_FAILED_TOTAL
            .with_label_values(&[channel.as_str()])
            .inc();
    }

    /// Record a delivery attempt
    pub fn record_attempt(channel: Channel, result: &str) {
        DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&[channel.as_str(), result])
            .inc();
    }

    /// Record per-token push results
    pub fn record_push_tokens(delivered: u64, failed: u64) {
        PUSH_TOKENS_TOTAL
            .with_label_values(&["delivered"])
            .inc_by(delivered);
        PUSH_TOKENS_TOTAL.with_label_values(&["failed"]).inc_by(failed);
    }

    /// Set the number of tasks waiting in the queue
    pub fn set_queue_depth(depth: usize) {
        QUEUE_DEPTH.set(depth as i64);
    }
}
