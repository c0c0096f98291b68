//! Failures crossing the wire.

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceBuilder;

use mesh_bus::{
    Broker, JsonKind, JsonSerializer, LocalNetwork, ObjectSchema, ProtocolConfig, ProtocolLayer,
    SerializationLayer, Serializer, TransportBroker, TransportBrokerConfig, ValidationLayer,
};
use mesh_types::{handler_fn, BrokerError, ErrorHandler, ErrorMapper, ErrorObject, ErrorOrigin};

use super::fixtures::{counter, service, service_with_mapper, REQUEST_TIMEOUT, SETTLE};

#[tokio::test]
async fn test_two_level_cause_chain_survives_the_wire() {
    let network = LocalNetwork::new();
    let server = service(&network, "server");
    server.broker.handle_request(
        "orders.place",
        handler_fn(|_: Value, _| async {
            let root = ErrorObject::new("ConnectionRefused", "db is down");
            let middle = ErrorObject::new("QueryError", "insert failed").caused_by(root);
            Err(BrokerError::Handler(
                ErrorObject::new("OrderError", "could not place order").caused_by(middle),
            ))
        }),
    );
    server.broker.start().await.unwrap();

    let err = server.broker.request("orders.place", json!({})).await.unwrap_err();

    assert_eq!(err.name(), "ResponseError");
    let remote = err.remote_cause().unwrap();
    let names: Vec<&str> = remote.chain().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["OrderError", "QueryError", "ConnectionRefused"]);
    assert_eq!(remote.root_cause().unwrap().name, "ConnectionRefused");
    assert_eq!(remote.root_cause().unwrap().message, "db is down");
    assert!(remote.stack.contains("Cause: QueryError: insert failed"));

    // The server reported the original failure locally
    assert_eq!(
        *server.reports.lock(),
        vec![("OrderError".to_string(), ErrorOrigin::Request)]
    );
}

#[tokio::test]
async fn test_mapper_returning_none_hides_the_error() {
    let network = LocalNetwork::new();
    let server = service_with_mapper(&network, "server", ErrorMapper::opaque());
    let client = service(&network, "client");
    server.broker.handle_request(
        "vault.open",
        handler_fn(|_: Value, _| async { Err(BrokerError::handler("SecretError", "pin 1234 rejected")) }),
    );
    server.broker.start().await.unwrap();
    client.broker.start().await.unwrap();

    let err = client.broker.request("vault.open", Value::Null).await.unwrap_err();

    let remote = err.remote_cause().unwrap();
    assert_eq!(remote.name, "RemoteMethodError");
    assert!(!remote.stack.contains("1234"));
}

#[tokio::test]
async fn test_mapper_can_rename_errors() {
    let network = LocalNetwork::new();
    let mapper = ErrorMapper::from_fn(|err| {
        Some(BrokerError::handler("PublicError", format!("wrapped {}", err.name())))
    });
    let server = service_with_mapper(&network, "server", mapper);
    server.broker.handle_request(
        "x",
        handler_fn(|_: Value, _| async { Err(BrokerError::handler("Internal", "detail")) }),
    );
    server.broker.start().await.unwrap();

    let err = server.broker.request("x", Value::Null).await.unwrap_err();
    let remote = err.remote_cause().unwrap();
    assert_eq!(remote.name, "PublicError");
    assert_eq!(remote.message, "wrapped Internal");
}

#[tokio::test]
async fn test_invalid_input_never_reaches_handler() {
    let network = LocalNetwork::new();
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let error_handler = ErrorHandler::from_fn(move |err, origin| {
        sink.lock().push((err.name().to_string(), origin));
    });

    let broker = ServiceBuilder::new()
        .layer(ValidationLayer::new(
            ObjectSchema::new().required("user", JsonKind::String),
        ))
        .layer(ProtocolLayer::new(ProtocolConfig {
            error_handler: error_handler.clone(),
            ..ProtocolConfig::default()
        }))
        .layer(SerializationLayer::new(JsonSerializer))
        .service(TransportBroker::new(
            network.transport(),
            TransportBrokerConfig {
                request_timeout: REQUEST_TIMEOUT,
                error_handler,
                ..TransportBrokerConfig::default()
            },
        ));
    let calls = Arc::new(AtomicUsize::new(0));
    broker.handle_request("user.create", counter(&calls));
    broker.start().await.unwrap();

    let err = broker.request("user.create", json!({"user": 7})).await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(err.name(), "ResponseError");
    let remote = err.remote_cause().unwrap();
    assert_eq!(remote.name, "ValidationError");
    assert!(remote.message.contains("field `user` must be string"));
    assert_eq!(
        *reports.lock(),
        vec![("ValidationError".to_string(), ErrorOrigin::Request)]
    );

    broker.request("user.create", json!({"user": "Bob"})).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_request_without_handler_times_out() {
    let network = LocalNetwork::new();
    let client = service(&network, "client");
    client.broker.start().await.unwrap();

    let err = client.broker.request("nobody.home", json!(1)).await.unwrap_err();

    assert!(
        matches!(err, BrokerError::Timeout { ref topic, .. } if topic == "nobody.home"),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_failing_notification_goes_to_error_handler() {
    let network = LocalNetwork::new();
    let svc = service(&network, "svc");
    svc.broker.handle_notification(
        "audit.log",
        handler_fn(|_: Value, _| async { Err(BrokerError::handler("AuditError", "disk full")) }),
    );
    svc.broker.start().await.unwrap();

    // The caller never sees handler failures
    svc.broker.notify("audit.log", json!({"user": "Bob"})).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    assert_eq!(
        *svc.reports.lock(),
        vec![("AuditError".to_string(), ErrorOrigin::Notification)]
    );
}

#[tokio::test]
async fn test_lifecycle_misuse() {
    let network = LocalNetwork::new();
    let svc = service(&network, "svc");

    assert!(matches!(svc.broker.stop().await, Err(BrokerError::NotStarted)));
    svc.broker.start().await.unwrap();
    assert!(matches!(svc.broker.start().await, Err(BrokerError::AlreadyStarted)));
    svc.broker.stop().await.unwrap();
}

#[tokio::test]
async fn test_request_on_notification_topic_leaves_server_running() {
    let network = LocalNetwork::new();
    // Default error policy: an unhandled notification failure would abort
    let server = ServiceBuilder::new()
        .layer(ProtocolLayer::new(ProtocolConfig::default()))
        .layer(SerializationLayer::new(JsonSerializer))
        .service(TransportBroker::new(
            network.transport(),
            TransportBrokerConfig {
                request_timeout: REQUEST_TIMEOUT,
                ..TransportBrokerConfig::default()
            },
        ));
    let client = service(&network, "client");
    let calls = Arc::new(AtomicUsize::new(0));
    server.handle_notification("audit.log", counter(&calls));
    server.start().await.unwrap();
    client.broker.start().await.unwrap();

    let err = client.broker.request("audit.log", json!(1)).await.unwrap_err();
    assert_eq!(err.name(), "TimeoutError");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    client.broker.notify("audit.log", json!({"user": "Bob"})).await.unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(client.reports.lock().is_empty());
}

#[tokio::test]
async fn test_undecodable_request_is_answered_with_parse_error() {
    let network = LocalNetwork::new();
    let server = service(&network, "server");
    let calls = Arc::new(AtomicUsize::new(0));
    server.broker.handle_request("echo", counter(&calls));
    server.broker.start().await.unwrap();

    let wire = server.broker.inner().inner();
    let reply = wire
        .request("echo", Bytes::from_static(b"\xff not json"))
        .await
        .unwrap();
    let response = JsonSerializer.deserialize(&reply).unwrap();

    assert_eq!(response["type"], "response");
    assert_eq!(response["error"]["name"], "ParseError");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        *server.reports.lock(),
        vec![("ParseError".to_string(), ErrorOrigin::Request)]
    );
}
