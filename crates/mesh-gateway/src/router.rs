//! HTTP routes.
//!
//! | Route | Broker call | Success |
//! |-------|-------------|---------|
//! | `POST {prefix}/request/{topic}`, `POST {prefix}/call/{topic}` | `request` | 200 + JSON |
//! | `POST {prefix}/notify/{topic}`, `POST {prefix}/emit/{topic}` | `notify` | 201 |
//! | `GET {prefix}/health` | - | 200 |
//! | `GET /metrics` | - | Prometheus text |

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use mesh_bus::{is_literal_topic, Broker};
use mesh_telemetry::{encode_metrics, metric_inc, GATEWAY_REQUESTS};
use mesh_types::BrokerError;

use crate::config::GatewayConfig;

/// Broker handle shared by every route.
pub type SharedBroker = Arc<dyn Broker<Value>>;

#[derive(Clone)]
struct GatewayState {
    broker: SharedBroker,
    config: Arc<GatewayConfig>,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Request,
    Notify,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Notify => "notify",
        }
    }
}

/// Build the gateway router. `config` should already be validated.
pub fn build_router(broker: SharedBroker, config: GatewayConfig) -> Router {
    let prefix = config.prefix.clone();
    let state = GatewayState {
        broker,
        config: Arc::new(config),
    };

    let actions = Router::new()
        .route("/request/:topic", post(request_topic))
        .route("/call/:topic", post(request_topic))
        .route("/notify/:topic", post(notify_topic))
        .route("/emit/:topic", post(notify_topic))
        .route("/health", get(health_check))
        .with_state(state);

    let router = if prefix.is_empty() {
        actions
    } else {
        Router::new().nest(&prefix, actions)
    };

    router
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
}

async fn request_topic(
    State(state): State<GatewayState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Response {
    let response = match admit(&state, &topic, &body) {
        Ok(input) => match state.broker.request(&topic, input).await {
            Ok(output) => (StatusCode::OK, Json(output)).into_response(),
            Err(e) => broker_failure(&topic, &e),
        },
        Err(rejection) => rejection,
    };
    record(Action::Request, &response);
    response
}

async fn notify_topic(
    State(state): State<GatewayState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Response {
    let response = match admit(&state, &topic, &body) {
        Ok(input) => match state.broker.notify(&topic, input).await {
            Ok(()) => StatusCode::CREATED.into_response(),
            Err(e) => broker_failure(&topic, &e),
        },
        Err(rejection) => rejection,
    };
    record(Action::Notify, &response);
    response
}

/// Topic checks and body decoding shared by both actions.
fn admit(state: &GatewayState, topic: &str, body: &Bytes) -> Result<Value, Response> {
    if !is_literal_topic(topic) {
        return Err((StatusCode::BAD_REQUEST, "topic must not contain wildcards").into_response());
    }
    if !state.config.is_topic_allowed(topic) {
        warn!(topic = topic, "Refused topic");
        return Err((StatusCode::FORBIDDEN, "forbidden").into_response());
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!(topic = topic, error = %e, "Rejected invalid JSON body");
        (StatusCode::BAD_REQUEST, "body should be valid JSON").into_response()
    })
}

fn broker_failure(topic: &str, err: &BrokerError) -> Response {
    error!(topic = topic, error = %err, name = err.name(), "Broker call failed");

    let mut body = json!({
        "name": err.name(),
        "message": err.to_string(),
    });
    if let Some(cause) = err.remote_cause() {
        body["cause"] = json!({
            "name": cause.name,
            "message": cause.message,
        });
    }
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

fn record(action: Action, response: &Response) {
    metric_inc!(GATEWAY_REQUESTS, &[action.as_str(), response.status().as_str()]);
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "mesh-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics() -> Response {
    match encode_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}
