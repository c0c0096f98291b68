//! Fan-out and group delivery.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mesh_bus::{Broker, LocalNetwork};
use mesh_types::handler_fn;

use super::fixtures::{counter, recorder, service, SETTLE};

#[tokio::test]
async fn test_audit_log_reaches_both_handlers_without_waiting() {
    let network = LocalNetwork::new();
    let auditor = service(&network, "auditor");
    let client = service(&network, "client");

    let received = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let sink = Arc::clone(&received);
        auditor.broker.handle_notification(
            "audit.log",
            handler_fn(move |input: Value, _| {
                let sink = Arc::clone(&sink);
                async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    sink.lock().push(input);
                    Ok(Value::Null)
                }
            }),
        );
    }
    auditor.broker.start().await.unwrap();
    client.broker.start().await.unwrap();

    let started = Instant::now();
    client.broker.notify("audit.log", json!({"user": "Bob"})).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(200));
    assert!(received.lock().is_empty());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(*received.lock(), vec![json!({"user": "Bob"}); 2]);
}

#[tokio::test]
async fn test_independent_handlers_each_receive_every_message() {
    let network = LocalNetwork::new();
    let client = service(&network, "client");
    let subscribers: Vec<_> = (0..3)
        .map(|i| service(&network, &format!("subscriber-{i}")))
        .collect();
    let logs: Vec<_> = (0..3).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();

    for (svc, log) in subscribers.iter().zip(&logs) {
        svc.broker.handle_notification("orders.*", recorder(log));
        svc.broker.start().await.unwrap();
    }
    client.broker.start().await.unwrap();

    for n in 0..5 {
        client.broker.notify("orders.created", json!(n)).await.unwrap();
    }
    tokio::time::sleep(SETTLE).await;

    for log in &logs {
        let mut values: Vec<i64> = log.lock().iter().filter_map(Value::as_i64).collect();
        values.sort_unstable();
        assert_eq!(values, [0, 1, 2, 3, 4]);
    }
}

#[tokio::test]
async fn test_group_members_share_each_message_once() {
    let network = LocalNetwork::new();
    let client = service(&network, "client");
    let workers: Vec<_> = (0..3)
        .map(|i| service(&network, &format!("worker-{i}")))
        .collect();
    let counts: Vec<_> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();

    for (svc, count) in workers.iter().zip(&counts) {
        svc.broker
            .handle_notification_in_group("jobs.run", "workers", counter(count));
        svc.broker.start().await.unwrap();
    }
    client.broker.start().await.unwrap();

    const MESSAGES: usize = 60;
    for n in 0..MESSAGES {
        client.broker.notify("jobs.run", json!(n)).await.unwrap();
    }
    tokio::time::sleep(SETTLE).await;

    let total: usize = counts.iter().map(|c| c.load(Ordering::SeqCst)).sum();
    assert_eq!(total, MESSAGES);
}

#[tokio::test]
async fn test_group_and_independent_handlers_mix() {
    let network = LocalNetwork::new();
    let svc = service(&network, "mixed");
    let grouped = Arc::new(AtomicUsize::new(0));
    let solo = Arc::new(AtomicUsize::new(0));

    svc.broker
        .handle_notification_in_group("metrics.>", "sink", counter(&grouped));
    svc.broker
        .handle_notification_in_group("metrics.>", "sink", counter(&grouped));
    svc.broker.handle_notification("metrics.>", counter(&solo));
    svc.broker.start().await.unwrap();

    for _ in 0..10 {
        svc.broker.notify("metrics.cpu.load", Value::Null).await.unwrap();
    }
    tokio::time::sleep(SETTLE).await;

    assert_eq!(grouped.load(Ordering::SeqCst), 10);
    assert_eq!(solo.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_notify_without_subscribers_is_fine() {
    let network = LocalNetwork::new();
    let svc = service(&network, "lonely");
    svc.broker.start().await.unwrap();

    svc.broker.notify("nobody.listens", json!(1)).await.unwrap();
    assert!(svc.reports.lock().is_empty());
}
