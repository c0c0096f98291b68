//! Shared test fixtures.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;

use mesh_bus::{
    JsonSerializer, LocalNetwork, LocalTransport, ProtocolBroker, ProtocolConfig, ProtocolLayer,
    SerializationLayer, SerializingBroker, TransportBroker, TransportBrokerConfig,
    TransportOptions,
};
use mesh_types::{handler_fn, ErrorHandler, ErrorMapper, ErrorOrigin, SharedHandler};

pub type ServiceBroker =
    ProtocolBroker<SerializingBroker<TransportBroker<LocalTransport>, JsonSerializer>>;

/// Errors seen by a service's error handler, as `(name, origin)`.
pub type Reports = Arc<Mutex<Vec<(String, ErrorOrigin)>>>;

pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(300);

/// Time given to spawned notification handlers before asserting.
pub const SETTLE: Duration = Duration::from_millis(100);

pub struct Service {
    pub broker: ServiceBroker,
    pub reports: Reports,
}

pub fn service(network: &Arc<LocalNetwork>, name: &str) -> Service {
    service_with_mapper(network, name, ErrorMapper::default())
}

pub fn service_with_mapper(network: &Arc<LocalNetwork>, name: &str, mapper: ErrorMapper) -> Service {
    let reports = Reports::default();
    let sink = Arc::clone(&reports);
    let error_handler = ErrorHandler::from_fn(move |err, origin| {
        sink.lock().push((err.name().to_string(), origin));
    });

    let core = TransportBroker::new(
        network.transport(),
        TransportBrokerConfig {
            request_timeout: REQUEST_TIMEOUT,
            options: TransportOptions {
                client_name: name.to_string(),
            },
            error_handler: error_handler.clone(),
        },
    );
    let broker = ServiceBuilder::new()
        .layer(ProtocolLayer::new(ProtocolConfig {
            error_handler,
            error_mapper: mapper,
        }))
        .layer(SerializationLayer::new(JsonSerializer))
        .service(core);

    Service { broker, reports }
}

/// Handler that records every input it sees.
pub fn recorder(seen: &Arc<Mutex<Vec<Value>>>) -> SharedHandler<Value> {
    let seen = Arc::clone(seen);
    handler_fn(move |input: Value, _topic: String| {
        seen.lock().push(input);
        async { Ok(Value::Null) }
    })
}

/// Handler that only counts its invocations.
pub fn counter(count: &Arc<AtomicUsize>) -> SharedHandler<Value> {
    let count = Arc::clone(count);
    handler_fn(move |_: Value, _topic: String| {
        count.fetch_add(1, Ordering::SeqCst);
        async { Ok(Value::Null) }
    })
}
