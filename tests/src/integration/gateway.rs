//! HTTP in, transport out.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use mesh_bus::{Broker, LocalNetwork};
use mesh_gateway::{build_router, GatewayConfig};
use mesh_types::{handler_fn, BrokerError};

use super::fixtures::{recorder, service, Service, ServiceBroker, SETTLE};

async fn started_pair() -> (Service, Arc<ServiceBroker>) {
    let network = LocalNetwork::new();
    let server = service(&network, "server");
    let client = Arc::new(service(&network, "edge").broker);

    server.broker.handle_request(
        "math.double",
        handler_fn(|x: Value, _| async move {
            x.as_i64()
                .map(|n| json!(n * 2))
                .ok_or_else(|| BrokerError::handler("TypeError", "expected a number"))
        }),
    );
    server.broker.start().await.unwrap();
    client.start().await.unwrap();
    (server, client)
}

fn post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_http_call_crosses_the_transport() {
    let (_server, client) = started_pair().await;
    let router = build_router(client.clone(), GatewayConfig::default());

    let response = router.oneshot(post("/call/math.double", "21")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), json!(42));
}

#[tokio::test]
async fn test_remote_failure_is_reported_with_cause() {
    let (_server, client) = started_pair().await;
    let router = build_router(client.clone(), GatewayConfig::default());

    let response = router
        .oneshot(post("/call/math.double", r#""twenty-one""#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["name"], "ResponseError");
    assert_eq!(body["cause"]["name"], "TypeError");
}

#[tokio::test]
async fn test_http_emit_reaches_subscriber() {
    let (server, client) = started_pair().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    server.broker.handle_notification("audit.log", recorder(&seen));
    let router = build_router(client.clone(), GatewayConfig::default());

    let response = router
        .oneshot(post("/emit/audit.log", r#"{"user":"Bob"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    tokio::time::sleep(SETTLE).await;
    assert_eq!(*seen.lock(), vec![json!({"user": "Bob"})]);
}
