//! Relay self-metrics
//!
//! Counters describing the relay's own health. They are recorded through the
//! `metrics` facade and are only exported when a Prometheus listener address
//! is configured; otherwise recording is a no-op.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Enum representing all metric names used by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Relay
    EventsReceived,
    EventsIgnored,
    EventsMalformed,

    // Writer
    PointsWritten,
    WriteFailures,
    PointsDropped,
    PointsRejected,

    // Provisioning
    ProvisionAttempts,
    DatabasesCreated,

    // Gateway
    GatewayReconnects,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::EventsReceived => "guild_metrics_events_received_total",
            MetricName::EventsIgnored => "guild_metrics_events_ignored_total",
            MetricName::EventsMalformed => "guild_metrics_events_malformed_total",

            MetricName::PointsWritten => "guild_metrics_points_written_total",
            MetricName::WriteFailures => "guild_metrics_write_failures_total",
            MetricName::PointsDropped => "guild_metrics_points_dropped_total",
            MetricName::PointsRejected => "guild_metrics_points_rejected_total",

            MetricName::ProvisionAttempts => "guild_metrics_provision_attempts_total",
            MetricName::DatabasesCreated => "guild_metrics_databases_created_total",

            MetricName::GatewayReconnects => "guild_metrics_gateway_reconnects_total",
        }
    }
}

/// Install the Prometheus recorder and HTTP listener when an address is given.
pub fn init(addr: Option<SocketAddr>) {
    let Some(addr) = addr else {
        info!("Relay metrics exporter disabled (RELAY_METRICS_ADDR not set)");
        return;
    };

    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => info!("Prometheus exporter listening at http://{}/metrics", addr),
        Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
    }
}

// ============================================================================
// Relay Metrics
// ============================================================================

pub mod relay {
    use super::MetricName;

    pub fn event_received(source: &'static str) {
        ::metrics::counter!(MetricName::EventsReceived.as_str(), "source" => source).increment(1);
    }

    pub fn event_ignored() {
        ::metrics::counter!(MetricName::EventsIgnored.as_str()).increment(1);
    }

    pub fn event_malformed(event_type: &str) {
        ::metrics::counter!(
            MetricName::EventsMalformed.as_str(),
            "event_type" => event_type.to_string()
        )
        .increment(1);
    }
}

// ============================================================================
// Writer Metrics
// ============================================================================

pub mod writer {
    use super::MetricName;

    pub fn record_point_written(measurement: &str) {
        ::metrics::counter!(
            MetricName::PointsWritten.as_str(),
            "measurement" => measurement.to_string()
        )
        .increment(1);
    }

    pub fn record_write_failure(measurement: &str) {
        ::metrics::counter!(
            MetricName::WriteFailures.as_str(),
            "measurement" => measurement.to_string()
        )
        .increment(1);
    }

    /// Dropped because the queue was full or closed
    pub fn record_point_dropped(measurement: &str) {
        ::metrics::counter!(
            MetricName::PointsDropped.as_str(),
            "measurement" => measurement.to_string()
        )
        .increment(1);
    }

    /// Rejected by schema validation
    pub fn record_point_rejected(measurement: &str) {
        ::metrics::counter!(
            MetricName::PointsRejected.as_str(),
            "measurement" => measurement.to_string()
        )
        .increment(1);
    }
}

// ============================================================================
// Provisioning Metrics
// ============================================================================

pub mod provisioning {
    use super::MetricName;

    pub fn attempt() {
        ::metrics::counter!(MetricName::ProvisionAttempts.as_str()).increment(1);
    }

    pub fn database_created() {
        ::metrics::counter!(MetricName::DatabasesCreated.as_str()).increment(1);
    }
}

// ============================================================================
// Gateway Metrics
// ============================================================================

pub mod gateway {
    use super::MetricName;

    pub fn reconnect() {
        ::metrics::counter!(MetricName::GatewayReconnects.as_str()).increment(1);
    }
}
