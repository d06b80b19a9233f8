//! Metrics collection module for the notification service
//!
//! Prometheus collectors for:
//! - Admitted requests by type and outcome
//! - Queue admission per channel
//! - Worker deliveries and their duration
//! - Queue depth

use crate::config::MetricsConfig;
use crate::error::{NotificationError, Result};
use fanout_shared::{DeliveryChannel, NotificationType};

use prometheus::core::Collector;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Metrics collector for the notification service
#[derive(Clone)]
pub struct NotificationMetrics {
    registry: Arc<Registry>,

    // Counters
    requests_total: IntCounterVec,
    messages_enqueued: IntCounterVec,
    messages_rejected: IntCounterVec,
    recipients_skipped: IntCounterVec,
    deliveries_total: IntCounterVec,

    // Gauges
    queue_depth: IntGaugeVec,

    // Histograms
    delivery_duration: HistogramVec,
}

impl NotificationMetrics {
    /// Create a new metrics collector with its own registry
    pub fn new(config: &MetricsConfig) -> Result<Self> {
        info!("Initializing notification metrics");

        let registry = Registry::new();
        let namespace = config.namespace.as_str();

        let requests_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("requests_total", "Notification requests by type and outcome")
                    .namespace(namespace),
                &["type", "outcome"],
            ),
        )?;

        let messages_enqueued = register(
            &registry,
            IntCounterVec::new(
                Opts::new("messages_enqueued_total", "Channel messages admitted to a queue")
                    .namespace(namespace),
                &["channel"],
            ),
        )?;

        let messages_rejected = register(
            &registry,
            IntCounterVec::new(
                Opts::new("messages_rejected_total", "Channel messages refused by a queue")
                    .namespace(namespace),
                &["channel", "reason"],
            ),
        )?;

        let recipients_skipped = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "recipients_skipped_total",
                    "Resolved recipients that produced no messages",
                )
                .namespace(namespace),
                &["reason"],
            ),
        )?;

        let deliveries_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("deliveries_total", "Send attempts made by workers")
                    .namespace(namespace),
                &["channel", "outcome"],
            ),
        )?;

        let queue_depth = register(
            &registry,
            IntGaugeVec::new(
                Opts::new("queue_depth", "Messages waiting in each channel queue")
                    .namespace(namespace),
                &["channel"],
            ),
        )?;

        let delivery_duration = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "delivery_duration_seconds",
                    "Time taken by a channel sender",
                )
                .namespace(namespace)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
                &["channel", "outcome"],
            ),
        )?;

        info!("Notification metrics initialized successfully");

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            messages_enqueued,
            messages_rejected,
            recipients_skipped,
            deliveries_total,
            queue_depth,
            delivery_duration,
        })
    }

    pub fn record_request(&self, notification_type: NotificationType, outcome: &str) {
        self.requests_total
            .with_label_values(&[&notification_type.to_string(), outcome])
            .inc();
    }

    pub fn record_enqueued(&self, channel: DeliveryChannel) {
        self.messages_enqueued
            .with_label_values(&[channel.as_str()])
            .inc();
    }

    pub fn record_rejected(&self, channel: DeliveryChannel, reason: &str) {
        self.messages_rejected
            .with_label_values(&[channel.as_str(), reason])
            .inc();
    }

    pub fn record_skipped(&self, reason: &str) {
        self.recipients_skipped.with_label_values(&[reason]).inc();
    }

    pub fn record_delivery(&self, channel: DeliveryChannel, success: bool, seconds: f64) {
        let outcome = if success { "success" } else { "failure" };
        self.deliveries_total
            .with_label_values(&[channel.as_str(), outcome])
            .inc();
        self.delivery_duration
            .with_label_values(&[channel.as_str(), outcome])
            .observe(seconds);
    }

    pub fn set_queue_depth(&self, channel: DeliveryChannel, depth: usize) {
        self.queue_depth
            .with_label_values(&[channel.as_str()])
            .set(depth as i64);
    }

    /// Get Prometheus registry for the metrics endpoint
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String> {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        encoder
            .encode_to_string(&metric_families)
            .map_err(|e| NotificationError::internal(format!("Failed to encode metrics: {}", e)))
    }

    /// Create a timer for measuring a send
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer {
            start_time: Instant::now(),
        }
    }
}

fn register<C>(registry: &Registry, collector: prometheus::Result<C>) -> Result<C>
where
    C: Collector + Clone + 'static,
{
    let collector = collector
        .map_err(|e| NotificationError::internal(format!("Failed to create collector: {}", e)))?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| NotificationError::internal(format!("Failed to register collector: {}", e)))?;
    Ok(collector)
}

/// Timer for measuring operation duration
pub struct MetricsTimer {
    start_time: Instant,
}

impl MetricsTimer {
    /// Stop the timer and return the elapsed duration in seconds
    pub fn stop(self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}
