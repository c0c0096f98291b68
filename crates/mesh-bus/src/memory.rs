//! In-process broker.
//!
//! Dispatches directly to registered handlers. There is no timeout: a
//! request lasts as long as its handler.

use async_trait::async_trait;
use tracing::debug;

use mesh_telemetry::{
    log_topic_event, metric_inc, BROKER_NOTIFICATIONS, BROKER_REQUESTS, HANDLER_ERRORS,
};
use mesh_types::{BrokerError, ErrorHandler, ErrorOrigin, Payload, SharedHandler};

use crate::broker::Broker;
use crate::registry::HandlerRegistry;

const BROKER: &str = "memory";

pub struct MemoryBroker<P: Payload> {
    registry: HandlerRegistry<P>,
    error_handler: ErrorHandler,
}

impl<P: Payload> MemoryBroker<P> {
    pub fn new() -> Self {
        Self::with_error_handler(ErrorHandler::default())
    }

    /// Notification handler failures are reported to `error_handler`.
    pub fn with_error_handler(error_handler: ErrorHandler) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            error_handler,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry<P> {
        &self.registry
    }
}

impl<P: Payload> Default for MemoryBroker<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P: Payload> Broker<P> for MemoryBroker<P> {
    fn handle_request(&self, pattern: &str, handler: SharedHandler<P>) {
        self.registry.add_request(pattern, handler);
    }

    fn handle_notification(&self, pattern: &str, handler: SharedHandler<P>) {
        self.registry.add_notification(pattern, None, handler);
    }

    fn handle_notification_in_group(&self, pattern: &str, group: &str, handler: SharedHandler<P>) {
        self.registry.add_notification(pattern, Some(group), handler);
    }

    /// No matching handler resolves to the "no payload" sentinel.
    async fn request(&self, topic: &str, input: P) -> Result<P, BrokerError> {
        metric_inc!(BROKER_REQUESTS, &[BROKER]);

        let Some(handler) = self.registry.select_request(topic) else {
            log_topic_event!(
                debug,
                "broker",
                "No request handler, returning empty payload",
                topic
            );
            return Ok(P::none());
        };

        debug!(topic = %topic, "Dispatching request");
        handler.call(input, topic.to_string()).await
    }

    async fn notify(&self, topic: &str, input: P) -> Result<(), BrokerError> {
        metric_inc!(BROKER_NOTIFICATIONS, &[BROKER]);

        let targets = self.registry.select_notification_targets(topic);
        debug!(topic = %topic, handlers = targets.len(), "Dispatching notification");

        for handler in targets {
            let input = input.clone();
            let topic = topic.to_string();
            let error_handler = self.error_handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.call(input, topic).await {
                    metric_inc!(HANDLER_ERRORS, &[ErrorOrigin::Notification.as_str()]);
                    error_handler.handle(&e, ErrorOrigin::Notification);
                }
            });
        }

        Ok(())
    }

    async fn start(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
