//! Transport capability.
//!
//! A transport is the pub/sub substrate a [`TransportBroker`](crate::TransportBroker)
//! runs on: queue-group subscriptions, fire-and-forget publish and a single
//! request/reply exchange. Only byte payloads cross it.
//!
//! Subscriptions carry their [`RegistrationKind`]: `publish` only reaches
//! notification subscriptions and `request_once` only request subscriptions.

mod local;
mod pending;

pub use local::{LocalNetwork, LocalTransport};
pub use pending::{PendingReplyStore, PendingStats};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

use mesh_types::BrokerError;

use crate::registry::RegistrationKind;

/// Invoked for every delivery with the payload and the concrete subject.
///
/// For request deliveries the returned bytes are sent back as the reply;
/// `None` sends nothing.
pub type DeliveryCallback = Arc<dyn Fn(Bytes, String) -> BoxFuture<'static, Option<Bytes>> + Send + Sync>;

/// Options passed to [`Transport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Name this client announces to the transport.
    pub client_name: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            client_name: "mesh".to_string(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, options: &TransportOptions) -> Result<(), BrokerError>;

    /// Close the connection and drop every subscription made through it.
    async fn close(&self) -> Result<(), BrokerError>;

    /// Subscribe `callback` to `pattern` for traffic of `kind`.
    ///
    /// A notification reaches one member of each matching `group`; a request
    /// reaches exactly one matching request subscription.
    fn subscribe(
        &self,
        kind: RegistrationKind,
        pattern: &str,
        group: &str,
        callback: DeliveryCallback,
    ) -> Result<(), BrokerError>;

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BrokerError>;

    /// Publish and wait for the first reply, up to `timeout`.
    async fn request_once(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes, BrokerError>;

    fn is_connected(&self) -> bool;
}
