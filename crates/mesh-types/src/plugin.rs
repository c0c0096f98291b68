//! # Plugin Trait
//!
//! Contract for components that take part in an ordered start/stop
//! lifecycle (brokers, gateways, middleware chains).
//!
//! ## Example Implementation
//!
//! ```rust,ignore
//! use mesh_types::{Plugin, PluginContext, PluginError};
//! use async_trait::async_trait;
//!
//! pub struct Cache { /* ... */ }
//!
//! #[async_trait]
//! impl Plugin for Cache {
//!     fn name(&self) -> &str { "cache" }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//!     async fn start(&self, ctx: &PluginContext) -> Result<(), PluginError> { Ok(()) }
//! }
//! ```

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::errors::BrokerError;

/// Plugin lifecycle errors.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin must have a non-empty name")]
    EmptyName,

    #[error("duplicate plugin name: {0}")]
    DuplicateName(String),

    #[error("plugin {plugin} failed: {message}")]
    Failed { plugin: String, message: String },

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl PluginError {
    pub fn failed(plugin: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Failed {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }
}

/// Lifecycle status of a plugin inside a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// A named lifecycle participant.
#[async_trait]
pub trait Plugin: Any + Send + Sync {
    /// Unique, non-empty name within a stack.
    fn name(&self) -> &str;

    /// Downcast hook for [`PluginContext::get_as`].
    fn as_any(&self) -> &dyn Any;

    async fn start(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    async fn stop(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }
}

pub type DynPlugin = Arc<dyn Plugin>;

/// Read-only snapshot of every plugin in a stack, keyed by name.
#[derive(Clone, Default)]
pub struct PluginContext {
    plugins: Arc<HashMap<String, DynPlugin>>,
}

impl PluginContext {
    pub(crate) fn new(plugins: HashMap<String, DynPlugin>) -> Self {
        Self {
            plugins: Arc::new(plugins),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DynPlugin> {
        self.plugins.get(name)
    }

    /// Look up a sibling and downcast it to its concrete type.
    pub fn get_as<T: Plugin>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_any().downcast_ref::<T>()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugins", &self.names())
            .finish()
    }
}
