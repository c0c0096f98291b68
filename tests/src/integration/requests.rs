//! Request/response across services.

use serde_json::{json, Value};
use std::collections::HashSet;

use mesh_bus::{Broker, LocalNetwork};
use mesh_types::handler_fn;

use super::fixtures::service;

#[tokio::test]
async fn test_math_double_across_services() {
    let network = LocalNetwork::new();
    let server = service(&network, "math");
    let client = service(&network, "client");

    server.broker.handle_request(
        "math.double",
        handler_fn(|x: Value, _| async move { Ok(json!(x.as_i64().unwrap_or_default() * 2)) }),
    );
    server.broker.start().await.unwrap();
    client.broker.start().await.unwrap();

    let output = client.broker.request("math.double", json!(21)).await.unwrap();

    assert_eq!(output, json!(42));
    assert!(server.reports.lock().is_empty());
}

#[tokio::test]
async fn test_wildcard_handler_receives_concrete_topic() {
    let network = LocalNetwork::new();
    let server = service(&network, "greeter");
    server.broker.handle_request(
        "greet.*",
        handler_fn(|name: Value, topic: String| async move {
            Ok(json!(format!("{topic}: hello {}", name.as_str().unwrap_or("?"))))
        }),
    );
    server.broker.start().await.unwrap();

    let output = server.broker.request("greet.en", json!("Bob")).await.unwrap();
    assert_eq!(output, json!("greet.en: hello Bob"));
}

#[tokio::test]
async fn test_competing_handlers_both_serve() {
    let network = LocalNetwork::new();
    let first = service(&network, "first");
    let second = service(&network, "second");
    let client = service(&network, "client");

    first
        .broker
        .handle_request("who", handler_fn(|_: Value, _| async { Ok(json!("first")) }));
    second
        .broker
        .handle_request("who", handler_fn(|_: Value, _| async { Ok(json!("second")) }));
    for svc in [&first, &second, &client] {
        svc.broker.start().await.unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..100 {
        let output = client.broker.request("who", Value::Null).await.unwrap();
        seen.insert(output.as_str().unwrap_or_default().to_string());
    }

    assert_eq!(seen.len(), 2, "both handlers must answer at least once: {seen:?}");
}

#[tokio::test]
async fn test_null_input_and_output_round_trip() {
    let network = LocalNetwork::new();
    let server = service(&network, "void");
    server
        .broker
        .handle_request("void", handler_fn(|x: Value, _| async move { Ok(x) }));
    server.broker.start().await.unwrap();

    assert_eq!(server.broker.request("void", Value::Null).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_handler_registered_after_start_serves() {
    let network = LocalNetwork::new();
    let server = service(&network, "late");
    server.broker.start().await.unwrap();

    server.broker.handle_request(
        "late.join",
        handler_fn(|_: Value, _| async { Ok(json!("joined")) }),
    );

    assert_eq!(
        server.broker.request("late.join", Value::Null).await.unwrap(),
        json!("joined")
    );
}
