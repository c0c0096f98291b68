//! # Plugin Stack - Ordered Lifecycle Management
//!
//! Starts plugins in the order they were given and stops them in reverse.
//!
//! ## Behavior
//!
//! - **Fail fast on start**: the first plugin that fails to start aborts
//!   `start()`; plugins after it are never started
//! - **Best effort on stop**: every running plugin is stopped, even if an
//!   earlier one fails; the first failure is returned
//! - **Sibling lookup**: each lifecycle call gets a [`PluginContext`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! let stack = PluginStack::new(vec![broker_plugin, gateway_plugin])?;
//! stack.start().await?;
//! // ...
//! stack.stop().await?;
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::plugin::{DynPlugin, PluginContext, PluginError, PluginStatus};

struct PluginEntry {
    plugin: DynPlugin,
    status: RwLock<PluginStatus>,
}

impl PluginEntry {
    fn set(&self, status: PluginStatus) {
        *self.status.write() = status;
    }
}

/// Ordered container of plugins.
pub struct PluginStack {
    entries: Vec<PluginEntry>,
    context: PluginContext,
}

impl PluginStack {
    /// Build a stack; names must be non-empty and unique.
    pub fn new(plugins: Vec<DynPlugin>) -> Result<Self, PluginError> {
        let mut by_name = HashMap::with_capacity(plugins.len());

        for plugin in &plugins {
            let name = plugin.name();
            if name.is_empty() {
                return Err(PluginError::EmptyName);
            }
            if by_name
                .insert(name.to_string(), Arc::clone(plugin))
                .is_some()
            {
                return Err(PluginError::DuplicateName(name.to_string()));
            }
        }

        let entries = plugins
            .into_iter()
            .map(|plugin| PluginEntry {
                plugin,
                status: RwLock::new(PluginStatus::Stopped),
            })
            .collect();

        Ok(Self {
            entries,
            context: PluginContext::new(by_name),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plugin names in start order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.plugin.name()).collect()
    }

    pub fn status(&self, name: &str) -> Option<PluginStatus> {
        self.entries
            .iter()
            .find(|e| e.plugin.name() == name)
            .map(|e| *e.status.read())
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Start every plugin, in order, one at a time.
    pub async fn start(&self) -> Result<(), PluginError> {
        info!("[Plugins] Starting {} plugins", self.entries.len());

        for entry in &self.entries {
            if *entry.status.read() == PluginStatus::Running {
                continue;
            }

            let name = entry.plugin.name();
            info!("[Plugins] Starting {}", name);
            entry.set(PluginStatus::Starting);

            if let Err(e) = entry.plugin.start(&self.context).await {
                entry.set(PluginStatus::Failed);
                error!("[Plugins] ✗ {} failed to start: {}", name, e);
                return Err(e);
            }

            entry.set(PluginStatus::Running);
            info!("[Plugins] ✓ {} started", name);
        }

        info!("[Plugins] All plugins started");
        Ok(())
    }

    /// Stop running plugins in reverse order.
    pub async fn stop(&self) -> Result<(), PluginError> {
        info!("[Plugins] Stopping all plugins");
        let mut first_error = None;

        for entry in self.entries.iter().rev() {
            if *entry.status.read() != PluginStatus::Running {
                continue;
            }

            let name = entry.plugin.name();
            entry.set(PluginStatus::Stopping);

            match entry.plugin.stop(&self.context).await {
                Ok(()) => {
                    entry.set(PluginStatus::Stopped);
                    info!("[Plugins] ✓ {} stopped", name);
                }
                Err(e) => {
                    entry.set(PluginStatus::Failed);
                    error!("[Plugins] ✗ {} failed to stop cleanly: {}", name, e);
                    // Continue stopping others
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("[Plugins] All plugins stopped");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for PluginStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginStack")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Plugin;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::any::Any;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        fail_start: bool,
        fail_stop: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail_start: false,
                fail_stop: false,
            }
        }
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn start(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.log.lock().push(format!("start {}", self.name));
            if self.fail_start {
                return Err(PluginError::failed(self.name, "refused to start"));
            }
            Ok(())
        }

        async fn stop(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.log.lock().push(format!("stop {}", self.name));
            if self.fail_stop {
                return Err(PluginError::failed(self.name, "refused to stop"));
            }
            Ok(())
        }
    }

    struct Peeker {
        seen: Mutex<Option<&'static str>>,
    }

    #[async_trait]
    impl Plugin for Peeker {
        fn name(&self) -> &str {
            "peeker"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn start(&self, ctx: &PluginContext) -> Result<(), PluginError> {
            let sibling = ctx
                .get_as::<Recorder>("a")
                .ok_or_else(|| PluginError::failed("peeker", "sibling a missing"))?;
            *self.seen.lock() = Some(sibling.name);
            Ok(())
        }
    }

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_start_forward_stop_reverse() {
        let log = log();
        let stack = PluginStack::new(vec![
            Arc::new(Recorder::new("a", &log)),
            Arc::new(Recorder::new("b", &log)),
            Arc::new(Recorder::new("c", &log)),
        ])
        .unwrap();

        stack.start().await.unwrap();
        assert_eq!(stack.status("b"), Some(PluginStatus::Running));
        stack.stop().await.unwrap();
        assert_eq!(stack.status("b"), Some(PluginStatus::Stopped));

        assert_eq!(
            *log.lock(),
            ["start a", "start b", "start c", "stop c", "stop b", "stop a"]
        );
    }

    #[tokio::test]
    async fn test_start_fails_fast_and_stop_skips_unstarted() {
        let log = log();
        let mut failing = Recorder::new("b", &log);
        failing.fail_start = true;
        let stack = PluginStack::new(vec![
            Arc::new(Recorder::new("a", &log)),
            Arc::new(failing),
            Arc::new(Recorder::new("c", &log)),
        ])
        .unwrap();

        let err = stack.start().await.unwrap_err();
        assert!(matches!(err, PluginError::Failed { ref plugin, .. } if plugin == "b"));
        assert_eq!(stack.status("b"), Some(PluginStatus::Failed));
        assert_eq!(stack.status("c"), Some(PluginStatus::Stopped));

        stack.stop().await.unwrap();
        assert_eq!(*log.lock(), ["start a", "start b", "stop a"]);
    }

    #[tokio::test]
    async fn test_stop_continues_past_failures() {
        let log = log();
        let mut failing = Recorder::new("b", &log);
        failing.fail_stop = true;
        let stack = PluginStack::new(vec![
            Arc::new(Recorder::new("a", &log)),
            Arc::new(failing),
            Arc::new(Recorder::new("c", &log)),
        ])
        .unwrap();

        stack.start().await.unwrap();
        let err = stack.stop().await.unwrap_err();

        assert!(matches!(err, PluginError::Failed { ref plugin, .. } if plugin == "b"));
        assert_eq!(
            *log.lock(),
            ["start a", "start b", "start c", "stop c", "stop b", "stop a"]
        );
        assert_eq!(stack.status("a"), Some(PluginStatus::Stopped));
    }

    #[tokio::test]
    async fn test_context_exposes_siblings() {
        let log = log();
        let peeker = Arc::new(Peeker {
            seen: Mutex::new(None),
        });
        let stack =
            PluginStack::new(vec![Arc::new(Recorder::new("a", &log)), peeker.clone()]).unwrap();

        stack.start().await.unwrap();
        assert_eq!(*peeker.seen.lock(), Some("a"));
        assert!(stack.context().contains("peeker"));
        assert!(stack.context().get_as::<Peeker>("a").is_none());
    }

    #[test]
    fn test_construction_errors() {
        let log = log();
        let err = PluginStack::new(vec![
            Arc::new(Recorder::new("a", &log)),
            Arc::new(Recorder::new("a", &log)),
        ])
        .unwrap_err();
        assert!(matches!(err, PluginError::DuplicateName(ref name) if name == "a"));

        let err = PluginStack::new(vec![Arc::new(Recorder::new("", &log))]).unwrap_err();
        assert!(matches!(err, PluginError::EmptyName));

        assert!(PluginStack::new(Vec::new()).unwrap().is_empty());
    }
}
