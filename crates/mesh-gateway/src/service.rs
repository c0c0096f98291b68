//! Gateway server lifecycle.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use mesh_types::{Plugin, PluginContext, PluginError};

use crate::config::{GatewayConfig, GatewayError};
use crate::router::{build_router, SharedBroker};

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), GatewayError>>,
}

/// HTTP gateway as a [`Plugin`]: `start` binds and serves, `stop` shuts
/// down gracefully.
pub struct GatewayServer {
    name: String,
    config: GatewayConfig,
    broker: SharedBroker,
    running: Mutex<Option<Running>>,
}

impl GatewayServer {
    pub fn new(
        name: impl Into<String>,
        config: GatewayConfig,
        broker: SharedBroker,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            broker,
            running: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Bound address while running (resolves port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.local_addr)
    }

    async fn serve(&self) -> Result<(), GatewayError> {
        let listener = TcpListener::bind(self.config.addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: self.config.addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| GatewayError::Bind {
            addr: self.config.addr,
            source,
        })?;

        let router = build_router(self.broker.clone(), self.config.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|e| GatewayError::Server(e.to_string()))
        });

        info!(addr = %local_addr, prefix = %self.config.prefix, "HTTP gateway listening");
        *self.running.lock() = Some(Running {
            local_addr,
            shutdown_tx,
            handle,
        });
        Ok(())
    }
}

#[async_trait]
impl Plugin for GatewayServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn start(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        if self.running.lock().is_some() {
            return Err(PluginError::failed(&self.name, "already running"));
        }
        self.serve()
            .await
            .map_err(|e| PluginError::failed(&self.name, e))
    }

    async fn stop(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };

        // The server may already have exited on its own
        let _ = running.shutdown_tx.send(());
        match running.handle.await {
            Ok(Ok(())) => {
                info!(addr = %running.local_addr, "HTTP gateway stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "HTTP gateway exited with error");
                Err(PluginError::failed(&self.name, e))
            }
            Err(e) => Err(PluginError::failed(&self.name, e)),
        }
    }
}
