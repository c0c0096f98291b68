//! Broker as a lifecycle participant.

use async_trait::async_trait;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

use mesh_types::{Payload, Plugin, PluginContext, PluginError};

use crate::broker::Broker;

/// Starts and stops a broker as part of a [`PluginStack`](mesh_types::PluginStack).
pub struct BrokerPlugin<B, P> {
    name: String,
    broker: Arc<B>,
    _payload: PhantomData<fn() -> P>,
}

impl<B, P> BrokerPlugin<B, P>
where
    B: Broker<P> + 'static,
    P: Payload,
{
    pub fn new(name: impl Into<String>, broker: Arc<B>) -> Self {
        Self {
            name: name.into(),
            broker,
            _payload: PhantomData,
        }
    }

    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }
}

#[async_trait]
impl<B, P> Plugin for BrokerPlugin<B, P>
where
    B: Broker<P> + 'static,
    P: Payload,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn start(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        self.broker.start().await?;
        info!(plugin = %self.name, "Broker started");
        Ok(())
    }

    async fn stop(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        self.broker.stop().await?;
        info!(plugin = %self.name, "Broker stopped");
        Ok(())
    }
}
