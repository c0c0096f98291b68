//! # Mesh Bus - Topic-Routed Broker
//!
//! Request/response and notifications addressed by dot-separated topics,
//! with wildcard patterns on the subscribing side.
//!
//! ## Layering
//!
//! ```text
//! ┌──────────────┐   Value   ┌──────────────┐   Value   ┌──────────────┐
//! │  Validation  │ ────────▶ │   Protocol   │ ────────▶ │Serialization │
//! └──────────────┘           └──────────────┘           └──────┬───────┘
//!                                                              │ Bytes
//!                                                              ▼
//!                                                     ┌──────────────────┐
//!                                                     │ TransportBroker  │
//!                                                     │  (or Memory)     │
//!                                                     └────────┬─────────┘
//!                                                              │
//!                                                     ┌────────▼─────────┐
//!                                                     │    Transport     │
//!                                                     └──────────────────┘
//! ```
//!
//! ## Delivery
//!
//! - **Requests:** one uniformly random matching handler answers.
//! - **Notifications:** every group receives the message once, through one
//!   random member. Ungrouped handlers are groups of one.
//! - **Failures:** request errors go back to the caller; notification
//!   errors go to the injected [`ErrorHandler`](mesh_types::ErrorHandler).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broker;
pub mod layers;
pub mod memory;
pub mod pattern;
pub mod plugin;
pub mod registry;
pub mod transport;
pub mod transport_broker;

pub use broker::Broker;
pub use layers::{
    validated, JsonKind, JsonSerializer, MessagePackSerializer, ObjectSchema, ProtocolBroker,
    ProtocolConfig, ProtocolLayer, SerializationLayer, Serializer, SerializingBroker,
    ValidatingBroker, ValidationLayer, Validator,
};
pub use memory::MemoryBroker;
pub use pattern::{is_literal_topic, matches, validate_pattern, PatternError};
pub use plugin::BrokerPlugin;
pub use registry::{HandlerRegistry, Registration, RegistrationKind};
pub use transport::{
    DeliveryCallback, LocalNetwork, LocalTransport, PendingReplyStore, PendingStats, Transport,
    TransportOptions,
};
pub use transport_broker::{TransportBroker, TransportBrokerConfig, DEFAULT_REQUEST_TIMEOUT};
