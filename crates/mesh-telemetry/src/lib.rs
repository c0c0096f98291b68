//! # Mesh Telemetry
//!
//! Observability for the mesh broker.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` registry with an `EnvFilter` and either a
//!   pretty or a JSON formatter
//! - **Metrics**: Prometheus counters in a process-wide registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mesh_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MESH_SERVICE_NAME` | `mesh` | Service name in logs |
//! | `MESH_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `MESH_JSON_LOGS` | `false` | JSON formatted output |
//! | `MESH_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, BROKER_NOTIFICATIONS, BROKER_REQUESTS, GATEWAY_REQUESTS,
    HANDLER_ERRORS, REGISTRY, REQUEST_TIMEOUTS,
};
pub use tracing_setup::{init_tracing, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize metrics and the global tracing subscriber.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first (no global subscriber needed)
    register_metrics()?;

    let tracing_guard = init_tracing(config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
