//! Runtime configuration from environment variables.

use std::env;
use std::time::Duration;
use tracing::warn;

use mesh_bus::DEFAULT_REQUEST_TIMEOUT;
use mesh_gateway::GatewayConfig;
use mesh_telemetry::TelemetryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub telemetry: TelemetryConfig,
    pub gateway: GatewayConfig,
    /// Upper bound for a request over the transport
    pub request_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            gateway: GatewayConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    /// # Environment Variables
    ///
    /// - `MESH_HTTP_ADDR`: gateway listen address (default: 127.0.0.1:8080)
    /// - `MESH_HTTP_PREFIX`: gateway path prefix (default: none)
    /// - `MESH_REQUEST_TIMEOUT_MS`: request timeout (default: 5000)
    /// - `MESH_ALLOW_TOPICS`, `MESH_DENY_TOPICS`: comma-separated patterns
    ///
    /// plus everything [`TelemetryConfig::from_env`] reads.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparseable values are logged and replaced by their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            telemetry: TelemetryConfig::from_lookup(&lookup),
            ..Self::default()
        };

        if let Some(addr) = lookup("MESH_HTTP_ADDR") {
            match addr.parse() {
                Ok(addr) => config.gateway.addr = addr,
                Err(_) => warn!(value = %addr, "MESH_HTTP_ADDR is not a socket address"),
            }
        }
        if let Some(prefix) = lookup("MESH_HTTP_PREFIX") {
            config.gateway.prefix = prefix;
        }
        if let Some(ms) = lookup("MESH_REQUEST_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) if ms > 0 => config.request_timeout = Duration::from_millis(ms),
                _ => warn!(value = %ms, "MESH_REQUEST_TIMEOUT_MS must be a positive integer"),
            }
        }
        if let Some(list) = lookup("MESH_ALLOW_TOPICS") {
            config.gateway.allow_topics = split_list(&list);
        }
        if let Some(list) = lookup("MESH_DENY_TOPICS") {
            config.gateway.deny_topics = split_list(&list);
        }

        config
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
