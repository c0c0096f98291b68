//! # Mesh Runtime
//!
//! Assembles a mesh service.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (from env)
//! 2. Build the broker stack on the local transport
//! 3. Register the built-in `system.*` handlers
//! 4. Start the plugin stack: broker first, then the HTTP gateway
//!
//! Shutdown runs the stack in reverse.

pub mod config;

use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

use mesh_bus::{
    validated, Broker, BrokerPlugin, JsonSerializer, LocalNetwork, LocalTransport, ObjectSchema,
    ProtocolBroker, ProtocolConfig, ProtocolLayer, SerializationLayer, SerializingBroker,
    TransportBroker, TransportBrokerConfig, TransportOptions,
};
use mesh_gateway::{GatewayError, GatewayServer, SharedBroker};
use mesh_types::{handler_fn, DynPlugin, PluginError, PluginStack};

pub use config::RuntimeConfig;

/// Protocol framing over JSON serialization over the local transport.
pub type AppBroker =
    ProtocolBroker<SerializingBroker<TransportBroker<LocalTransport>, JsonSerializer>>;

pub const BROKER_PLUGIN: &str = "broker";
pub const GATEWAY_PLUGIN: &str = "gateway";

pub struct MeshRuntime {
    network: Arc<LocalNetwork>,
    broker: Arc<AppBroker>,
    plugins: PluginStack,
}

impl MeshRuntime {
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let network = LocalNetwork::new();
        let core = TransportBroker::new(
            network.transport(),
            TransportBrokerConfig {
                request_timeout: config.request_timeout,
                options: TransportOptions {
                    client_name: config.telemetry.service_name.clone(),
                },
                ..TransportBrokerConfig::default()
            },
        );
        let broker = Arc::new(
            ServiceBuilder::new()
                .layer(ProtocolLayer::new(ProtocolConfig::default()))
                .layer(SerializationLayer::new(JsonSerializer))
                .service(core),
        );

        register_system_handlers(broker.as_ref(), &config.telemetry.service_name);

        let shared: SharedBroker = broker.clone();
        let plugins: Vec<DynPlugin> = vec![
            Arc::new(BrokerPlugin::<_, Value>::new(BROKER_PLUGIN, Arc::clone(&broker))),
            Arc::new(GatewayServer::new(GATEWAY_PLUGIN, config.gateway, shared)?),
        ];

        Ok(Self {
            network,
            broker,
            plugins: PluginStack::new(plugins)?,
        })
    }

    pub fn broker(&self) -> &Arc<AppBroker> {
        &self.broker
    }

    pub fn network(&self) -> &Arc<LocalNetwork> {
        &self.network
    }

    pub fn plugins(&self) -> &PluginStack {
        &self.plugins
    }

    /// Address the gateway is bound to, once started.
    pub fn gateway_addr(&self) -> Option<std::net::SocketAddr> {
        self.plugins
            .context()
            .get_as::<GatewayServer>(GATEWAY_PLUGIN)?
            .local_addr()
    }

    pub async fn start(&self) -> Result<(), PluginError> {
        self.plugins.start().await?;
        info!(plugins = ?self.plugins.names(), "Mesh runtime started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), PluginError> {
        info!("Initiating graceful shutdown...");
        self.plugins.stop().await?;
        info!("Shutdown complete");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// `system.ping` answers with the service name; `system.echo` returns any
/// object it is given.
fn register_system_handlers(broker: &impl Broker<Value>, service_name: &str) {
    let service = service_name.to_string();
    broker.handle_request(
        "system.ping",
        handler_fn(move |_: Value, _| {
            let service = service.clone();
            async move { Ok(json!({ "status": "ok", "service": service })) }
        }),
    );

    broker.handle_request(
        "system.echo",
        validated(
            Arc::new(ObjectSchema::new().allow_unknown()),
            handler_fn(|input: Value, _| async move { Ok(input) }),
        ),
    );
}
