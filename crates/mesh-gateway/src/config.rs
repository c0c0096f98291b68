//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

use mesh_bus::{matches, validate_pattern};

/// Gateway configuration errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid prefix {0:?}: must be empty or start with '/' and not end with '/'")]
    InvalidPrefix(String),

    #[error("invalid topic pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("gateway server error: {0}")]
    Server(String),
}

/// HTTP gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address
    pub addr: SocketAddr,
    /// Path prefix for the action routes, e.g. `/api`
    pub prefix: String,
    /// If non-empty, only topics matching one of these patterns are served
    pub allow_topics: Vec<String>,
    /// Topics matching any of these patterns are refused
    pub deny_topics: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            prefix: String::new(),
            allow_topics: Vec::new(),
            deny_topics: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !self.prefix.is_empty() && (!self.prefix.starts_with('/') || self.prefix.ends_with('/')) {
            return Err(GatewayError::InvalidPrefix(self.prefix.clone()));
        }

        for pattern in self.allow_topics.iter().chain(&self.deny_topics) {
            validate_pattern(pattern).map_err(|e| GatewayError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Deny wins over allow; an empty allow list allows everything.
    pub fn is_topic_allowed(&self, topic: &str) -> bool {
        if self.deny_topics.iter().any(|p| matches(p, topic)) {
            return false;
        }
        self.allow_topics.is_empty() || self.allow_topics.iter().any(|p| matches(p, topic))
    }
}
