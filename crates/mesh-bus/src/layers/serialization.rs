//! Serialization layer: exposes a byte broker as a JSON value broker.
//!
//! The "no payload" sentinels map onto each other: `Value::Null` is sent as
//! empty bytes and empty bytes are read back as `Value::Null`.
//!
//! Inbound payloads that fail to decode never fail silently on the wire:
//! a request handler receives `Value::Null` in their place, which the
//! protocol layer answers with a `ParseError` response. Undecodable
//! notifications are dropped.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tower::Layer;
use tracing::warn;

use mesh_types::{handler_fn, BrokerError, SharedHandler};

use crate::broker::Broker;

/// Converts application values to wire bytes and back.
pub trait Serializer: Send + Sync + 'static {
    fn serialize(&self, value: &Value) -> Result<Bytes, BrokerError>;
    fn deserialize(&self, bytes: &Bytes) -> Result<Value, BrokerError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Bytes, BrokerError> {
        if value.is_null() {
            return Ok(Bytes::new());
        }
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn deserialize(&self, bytes: &Bytes) -> Result<Value, BrokerError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact binary encoding of the same values (MessagePack).
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackSerializer;

impl Serializer for MessagePackSerializer {
    fn serialize(&self, value: &Value) -> Result<Bytes, BrokerError> {
        if value.is_null() {
            return Ok(Bytes::new());
        }
        rmp_serde::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| BrokerError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &Bytes) -> Result<Value, BrokerError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        rmp_serde::from_slice(bytes).map_err(|e| BrokerError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SerializationLayer<S> {
    serializer: Arc<S>,
}

impl<S: Serializer> SerializationLayer<S> {
    pub fn new(serializer: S) -> Self {
        Self {
            serializer: Arc::new(serializer),
        }
    }
}

impl<B, S> Layer<B> for SerializationLayer<S> {
    type Service = SerializingBroker<B, S>;

    fn layer(&self, inner: B) -> Self::Service {
        SerializingBroker {
            inner,
            serializer: Arc::clone(&self.serializer),
        }
    }
}

/// `Broker<Value>` over an inner `Broker<Bytes>`.
pub struct SerializingBroker<B, S> {
    inner: B,
    serializer: Arc<S>,
}

impl<B, S: Serializer> SerializingBroker<B, S> {
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn wrap_request(&self, handler: SharedHandler<Value>) -> SharedHandler<Bytes> {
        let serializer = Arc::clone(&self.serializer);
        handler_fn(move |input: Bytes, topic: String| {
            let serializer = Arc::clone(&serializer);
            let handler = Arc::clone(&handler);
            async move {
                let value = serializer.deserialize(&input).unwrap_or_else(|e| {
                    warn!(topic = %topic, error = %e, "Undecodable request payload");
                    Value::Null
                });
                let output = handler.call(value, topic).await?;
                serializer.serialize(&output)
            }
        })
    }

    fn wrap_notification(&self, handler: SharedHandler<Value>) -> SharedHandler<Bytes> {
        let serializer = Arc::clone(&self.serializer);
        handler_fn(move |input: Bytes, topic: String| {
            let serializer = Arc::clone(&serializer);
            let handler = Arc::clone(&handler);
            async move {
                let value = match serializer.deserialize(&input) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(topic = %topic, error = %e, "Dropped undecodable notification");
                        return Ok(Bytes::new());
                    }
                };
                handler.call(value, topic).await?;
                Ok(Bytes::new())
            }
        })
    }
}

#[async_trait]
impl<B, S> Broker<Value> for SerializingBroker<B, S>
where
    B: Broker<Bytes>,
    S: Serializer,
{
    fn handle_request(&self, pattern: &str, handler: SharedHandler<Value>) {
        self.inner.handle_request(pattern, self.wrap_request(handler));
    }

    fn handle_notification(&self, pattern: &str, handler: SharedHandler<Value>) {
        self.inner
            .handle_notification(pattern, self.wrap_notification(handler));
    }

    fn handle_notification_in_group(&self, pattern: &str, group: &str, handler: SharedHandler<Value>) {
        self.inner
            .handle_notification_in_group(pattern, group, self.wrap_notification(handler));
    }

    async fn request(&self, topic: &str, input: Value) -> Result<Value, BrokerError> {
        let payload = self.serializer.serialize(&input)?;
        let reply = self.inner.request(topic, payload).await?;
        self.serializer.deserialize(&reply)
    }

    async fn notify(&self, topic: &str, input: Value) -> Result<(), BrokerError> {
        let payload = self.serializer.serialize(&input)?;
        self.inner.notify(topic, payload).await
    }

    async fn start(&self) -> Result<(), BrokerError> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        self.inner.stop().await
    }
}
