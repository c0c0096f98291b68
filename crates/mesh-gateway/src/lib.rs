//! # Mesh Gateway - HTTP Entry Point
//!
//! Lets external callers reach broker topics over HTTP.
//!
//! ```text
//! POST /call/math.double   21     ──▶  broker.request("math.double", 21)  ──▶ 200 42
//! POST /emit/audit.log     {...}  ──▶  broker.notify("audit.log", {...})  ──▶ 201
//! ```
//!
//! ## Status Codes
//!
//! - **400:** body is not valid JSON, or the topic contains wildcards
//! - **403:** topic refused by the allow/deny lists
//! - **404:** unknown route
//! - **500:** the broker call failed; body is `{name, message}`

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod router;
pub mod service;

pub use config::{GatewayConfig, GatewayError};
pub use router::{build_router, SharedBroker};
pub use service::GatewayServer;
