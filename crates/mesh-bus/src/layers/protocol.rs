//! Protocol layer: frames every payload in an [`Envelope`].
//!
//! ## Server side
//!
//! Incoming requests are parsed, handed to the handler and answered with a
//! response envelope. Any failure on the way (bad envelope, validation,
//! handler error) is reported to the [`ErrorHandler`] with request origin,
//! passed through the [`ErrorMapper`] and sent back as the response `error`.
//!
//! Notifications whose envelope does not parse never reach the handler. They
//! are reported with [`ErrorOrigin::Envelope`] and dropped.
//!
//! ## Client side
//!
//! `request` wraps the input in a request envelope and unwraps the response,
//! turning a remote error into [`BrokerError::Response`].

use async_trait::async_trait;
use serde_json::Value;
use tower::Layer;
use tracing::debug;

use mesh_types::{
    build_notification_envelope, build_request_envelope, build_response_envelope, handler_fn,
    parse_notification_envelope, parse_request_envelope, BrokerError, Envelope, EnvelopeKind,
    ErrorHandler, ErrorMapper, ErrorOrigin, SharedHandler,
};

use crate::broker::Broker;

#[derive(Debug, Clone, Default)]
pub struct ProtocolConfig {
    pub error_handler: ErrorHandler,
    pub error_mapper: ErrorMapper,
}

#[derive(Debug, Clone, Default)]
pub struct ProtocolLayer {
    config: ProtocolConfig,
}

impl ProtocolLayer {
    pub fn new(config: ProtocolConfig) -> Self {
        Self { config }
    }
}

impl<B> Layer<B> for ProtocolLayer {
    type Service = ProtocolBroker<B>;

    fn layer(&self, inner: B) -> Self::Service {
        ProtocolBroker {
            inner,
            config: self.config.clone(),
        }
    }
}

pub struct ProtocolBroker<B> {
    inner: B,
    config: ProtocolConfig,
}

impl<B> ProtocolBroker<B> {
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn wrap_request(&self, handler: SharedHandler<Value>) -> SharedHandler<Value> {
        let error_handler = self.config.error_handler.clone();
        let error_mapper = self.config.error_mapper.clone();
        handler_fn(move |input: Value, topic: String| {
            let handler = handler.clone();
            let error_handler = error_handler.clone();
            let error_mapper = error_mapper.clone();
            async move {
                let (request_id, result) = match parse_request_envelope(input) {
                    Ok(envelope) => (envelope.id, handler.call(envelope.input, topic).await),
                    Err(e) => (None, Err(e)),
                };

                let response = match result {
                    Ok(output) => build_response_envelope(request_id, Ok(output)),
                    Err(err) => {
                        error_handler.handle(&err, ErrorOrigin::Request);
                        let mapped = error_mapper.map(err);
                        build_response_envelope(request_id, Err(mapped.to_object()))
                    }
                };
                response.into_value()
            }
        })
    }

    fn wrap_notification(&self, handler: SharedHandler<Value>) -> SharedHandler<Value> {
        let error_handler = self.config.error_handler.clone();
        handler_fn(move |input: Value, topic: String| {
            let handler = handler.clone();
            let error_handler = error_handler.clone();
            async move {
                let envelope = match parse_notification_envelope(input) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        debug!(topic = %topic, error = %e, "Rejected notification envelope");
                        error_handler.handle(&e, ErrorOrigin::Envelope);
                        return Ok(Value::Null);
                    }
                };
                handler.call(envelope.input, topic).await?;
                Ok(Value::Null)
            }
        })
    }
}

#[async_trait]
impl<B: Broker<Value>> Broker<Value> for ProtocolBroker<B> {
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
        let envelope = build_request_envelope(input);
        let request_id = envelope.id;
        debug!(topic = %topic, request_id = ?request_id, "Sending request envelope");

        let reply = self.inner.request(topic, envelope.into_value()?).await?;
        let response = Envelope::parse(reply, EnvelopeKind::Response)?;

        if let (Some(sent), Some(answered)) = (request_id, response.request_id) {
            if sent != answered {
                return Err(BrokerError::Parse(format!(
                    "response answers request {answered}, expected {sent}"
                )));
            }
        }
        response.into_output()
    }

    async fn notify(&self, topic: &str, input: Value) -> Result<(), BrokerError> {
        let envelope = build_notification_envelope(input);
        self.inner.notify(topic, envelope.into_value()?).await
    }

    async fn start(&self) -> Result<(), BrokerError> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        self.inner.stop().await
    }
}
