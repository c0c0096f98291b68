//! # Mesh Types Crate
//!
//! Contracts shared by every broker, layer and transport.
//!
//! ## Design Principles
//!
//! - **One error type**: every layer fails with [`BrokerError`]; its wire form
//!   [`ErrorObject`] keeps `name`, `message` and the cause chain across a
//!   process boundary.
//! - **Versioned framing**: the [`Envelope`] carries [`PROTOCOL_VERSION`] and
//!   is validated before any payload is trusted.
//! - **Explicit policy**: error reporting ([`ErrorHandler`]) and error
//!   rewriting ([`ErrorMapper`]) are injected, never global.

pub mod envelope;
pub mod error_policy;
pub mod errors;
pub mod middleware;
pub mod payload;
pub mod plugin;
pub mod plugin_stack;

pub use envelope::{
    build_event_envelope, build_notification_envelope, build_request_envelope,
    build_response_envelope, parse_notification_envelope, parse_request_envelope,
    parse_response_envelope, Envelope, EnvelopeKind, PROTOCOL_VERSION,
};
pub use error_policy::{ErrorHandler, ErrorMapper, ErrorOrigin};
pub use errors::{BrokerError, ErrorObject, ValidationError};
pub use middleware::{middleware_fn, Middleware, MiddlewareChain, Next};
pub use payload::{handler_fn, Handler, HandlerFuture, Payload, SharedHandler};
pub use plugin::{DynPlugin, Plugin, PluginContext, PluginError, PluginStatus};
pub use plugin_stack::PluginStack;
