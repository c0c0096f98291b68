//! Prometheus metrics for the broker and its gateway.
//!
//! All metrics follow the naming convention: `mesh_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::sync::Once;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BROKER METRICS
    // =========================================================================

    /// Requests dispatched, by broker variant
    pub static ref BROKER_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("mesh_broker_requests_total", "Requests dispatched by the broker"),
        &["broker"]  // broker: memory/transport
    ).expect("metric creation failed");

    /// Notifications published, by broker variant
    pub static ref BROKER_NOTIFICATIONS: CounterVec = CounterVec::new(
        Opts::new("mesh_broker_notifications_total", "Notifications published by the broker"),
        &["broker"]
    ).expect("metric creation failed");

    /// Handler failures, by the path they surfaced on
    pub static ref HANDLER_ERRORS: CounterVec = CounterVec::new(
        Opts::new("mesh_broker_handler_errors_total", "Handler failures"),
        &["origin"]  // origin: request/notification/transport
    ).expect("metric creation failed");

    /// Requests that ran out of time waiting for a reply
    pub static ref REQUEST_TIMEOUTS: CounterVec = CounterVec::new(
        Opts::new("mesh_broker_request_timeouts_total", "Requests that timed out"),
        &["broker"]
    ).expect("metric creation failed");

    // =========================================================================
    // GATEWAY METRICS
    // =========================================================================

    /// HTTP requests served by the gateway
    pub static ref GATEWAY_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("mesh_gateway_http_requests_total", "HTTP requests handled by the gateway"),
        &["action", "status"]
    ).expect("metric creation failed");
}

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Only the first call registers; later calls are no-ops.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let mut result = Ok(());
    REGISTER.call_once(|| {
        result = register_all();
    });
    result
}

fn register_all() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BROKER_REQUESTS.clone()),
        Box::new(BROKER_NOTIFICATIONS.clone()),
        Box::new(HANDLER_ERRORS.clone()),
        Box::new(REQUEST_TIMEOUTS.clone()),
        Box::new(GATEWAY_REQUESTS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    register_metrics()?;

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
