//! The `Broker` contract shared by every broker variant and every layer.

use async_trait::async_trait;
use std::sync::Arc;

use mesh_types::{BrokerError, Payload, SharedHandler};

/// Topic-routed request/response and notifications.
///
/// Registrations are legal before and after `start()`. Decorator layers
/// implement this same trait around an inner broker.
#[async_trait]
pub trait Broker<P: Payload>: Send + Sync {
    /// Competing request handler: each request goes to one matching handler.
    fn handle_request(&self, pattern: &str, handler: SharedHandler<P>);

    /// Independent notification handler: receives every matching message.
    fn handle_notification(&self, pattern: &str, handler: SharedHandler<P>);

    /// Load-shared notification handler: one member of `group` receives
    /// each matching message.
    fn handle_notification_in_group(&self, pattern: &str, group: &str, handler: SharedHandler<P>);

    async fn request(&self, topic: &str, input: P) -> Result<P, BrokerError>;

    /// Fire and forget. Resolves once the message is dispatched, without
    /// waiting for handlers.
    async fn notify(&self, topic: &str, input: P) -> Result<(), BrokerError>;

    async fn start(&self) -> Result<(), BrokerError>;

    async fn stop(&self) -> Result<(), BrokerError>;
}

#[async_trait]
impl<P, B> Broker<P> for Arc<B>
where
    P: Payload,
    B: Broker<P> + ?Sized,
{
    fn handle_request(&self, pattern: &str, handler: SharedHandler<P>) {
        (**self).handle_request(pattern, handler)
    }

    fn handle_notification(&self, pattern: &str, handler: SharedHandler<P>) {
        (**self).handle_notification(pattern, handler)
    }

    fn handle_notification_in_group(&self, pattern: &str, group: &str, handler: SharedHandler<P>) {
        (**self).handle_notification_in_group(pattern, group, handler)
    }

    async fn request(&self, topic: &str, input: P) -> Result<P, BrokerError> {
        (**self).request(topic, input).await
    }

    async fn notify(&self, topic: &str, input: P) -> Result<(), BrokerError> {
        (**self).notify(topic, input).await
    }

    async fn start(&self) -> Result<(), BrokerError> {
        (**self).start().await
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        (**self).stop().await
    }
}
