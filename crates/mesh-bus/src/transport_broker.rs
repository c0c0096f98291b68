//! Broker backed by a [`Transport`].
//!
//! Registrations made before `start()` are queued and subscribed once the
//! transport is connected; registrations made afterwards subscribe
//! immediately. Requests are bounded by `request_timeout`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mesh_telemetry::{
    log_event, metric_inc, BROKER_NOTIFICATIONS, BROKER_REQUESTS, HANDLER_ERRORS, REQUEST_TIMEOUTS,
};
use mesh_types::{BrokerError, ErrorHandler, ErrorOrigin, SharedHandler};

use crate::broker::Broker;
use crate::registry::{HandlerRegistry, Registration, RegistrationKind};
use crate::transport::{DeliveryCallback, Transport, TransportOptions};

const BROKER: &str = "transport";

/// Default time a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct TransportBrokerConfig {
    pub request_timeout: Duration,
    /// Passed to [`Transport::connect`] on `start()`.
    pub options: TransportOptions,
    /// Receives handler failures and late subscription failures.
    pub error_handler: ErrorHandler,
}

impl Default for TransportBrokerConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            options: TransportOptions::default(),
            error_handler: ErrorHandler::default(),
        }
    }
}

pub struct TransportBroker<T: Transport> {
    transport: T,
    config: TransportBrokerConfig,
    registry: HandlerRegistry<Bytes>,
    /// Serializes `start`/`stop`; `true` while started.
    lifecycle: Mutex<bool>,
}

impl<T: Transport> TransportBroker<T> {
    /// The broker owns `transport`; nothing else should use it.
    pub fn new(transport: T, config: TransportBrokerConfig) -> Self {
        Self {
            transport,
            config,
            registry: HandlerRegistry::new(),
            lifecycle: Mutex::new(false),
        }
    }

    pub fn config(&self) -> &TransportBrokerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn register(&self, (registration, active): (Registration<Bytes>, bool)) {
        if !active {
            debug!(pattern = %registration.pattern, "Queued registration until start");
            return;
        }
        if let Err(e) = self.subscribe(&registration) {
            metric_inc!(HANDLER_ERRORS, &[ErrorOrigin::Transport.as_str()]);
            self.config.error_handler.handle(&e, ErrorOrigin::Transport);
        }
    }

    fn subscribe(&self, registration: &Registration<Bytes>) -> Result<(), BrokerError> {
        let callback = match registration.kind {
            RegistrationKind::Request => self.request_callback(registration.handler.clone()),
            RegistrationKind::Notification => {
                self.notification_callback(registration.handler.clone())
            }
        };
        self.transport.subscribe(
            registration.kind,
            &registration.pattern,
            &registration.group,
            callback,
        )
    }

    fn request_callback(&self, handler: SharedHandler<Bytes>) -> DeliveryCallback {
        let error_handler = self.config.error_handler.clone();
        Arc::new(move |payload: Bytes, subject: String| {
            let handler = Arc::clone(&handler);
            let error_handler = error_handler.clone();
            async move {
                match handler.call(payload, subject).await {
                    Ok(reply) => Some(reply),
                    Err(e) => {
                        metric_inc!(HANDLER_ERRORS, &[ErrorOrigin::Request.as_str()]);
                        error_handler.handle(&e, ErrorOrigin::Request);
                        None
                    }
                }
            }
            .boxed()
        })
    }

    fn notification_callback(&self, handler: SharedHandler<Bytes>) -> DeliveryCallback {
        let error_handler = self.config.error_handler.clone();
        Arc::new(move |payload: Bytes, subject: String| {
            let handler = Arc::clone(&handler);
            let error_handler = error_handler.clone();
            async move {
                if let Err(e) = handler.call(payload, subject).await {
                    metric_inc!(HANDLER_ERRORS, &[ErrorOrigin::Notification.as_str()]);
                    error_handler.handle(&e, ErrorOrigin::Notification);
                }
                None
            }
            .boxed()
        })
    }
}

#[async_trait]
impl<T: Transport> Broker<Bytes> for TransportBroker<T> {
    fn handle_request(&self, pattern: &str, handler: SharedHandler<Bytes>) {
        self.register(self.registry.add_request(pattern, handler));
    }

    fn handle_notification(&self, pattern: &str, handler: SharedHandler<Bytes>) {
        self.register(self.registry.add_notification(pattern, None, handler));
    }

    fn handle_notification_in_group(&self, pattern: &str, group: &str, handler: SharedHandler<Bytes>) {
        self.register(self.registry.add_notification(pattern, Some(group), handler));
    }

    /// No subscriber for `topic` surfaces as a timeout.
    async fn request(&self, topic: &str, input: Bytes) -> Result<Bytes, BrokerError> {
        metric_inc!(BROKER_REQUESTS, &[BROKER]);
        debug!(topic = %topic, "Sending request");

        let result = self
            .transport
            .request_once(topic, input, self.config.request_timeout)
            .await;

        if let Err(ref e) = result {
            if e.is_timeout() {
                metric_inc!(REQUEST_TIMEOUTS, &[BROKER]);
                warn!(topic = %topic, timeout_ms = self.config.request_timeout.as_millis(), "Request timed out");
            }
        }
        result
    }

    async fn notify(&self, topic: &str, input: Bytes) -> Result<(), BrokerError> {
        metric_inc!(BROKER_NOTIFICATIONS, &[BROKER]);
        self.transport.publish(topic, input).await
    }

    /// Connect, then subscribe everything registered so far.
    async fn start(&self) -> Result<(), BrokerError> {
        let mut started = self.lifecycle.lock().await;
        if *started {
            return Err(BrokerError::AlreadyStarted);
        }

        self.transport.connect(&self.config.options).await?;

        let queued = self.registry.activate();
        for registration in &queued {
            if let Err(e) = self.subscribe(registration) {
                self.registry.deactivate();
                // Best effort: the connection is unusable for this broker now
                if let Err(close_err) = self.transport.close().await {
                    warn!(error = %close_err, "Failed to close transport after subscribe failure");
                }
                return Err(e);
            }
        }

        *started = true;
        log_event!(
            info,
            "broker",
            "Transport broker started",
            client = %self.config.options.client_name,
            subscriptions = queued.len()
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        let mut started = self.lifecycle.lock().await;
        if !*started {
            return Err(BrokerError::NotStarted);
        }

        self.registry.deactivate();
        self.transport.close().await?;
        *started = false;
        info!(client = %self.config.options.client_name, "Transport broker stopped");
        Ok(())
    }
}
