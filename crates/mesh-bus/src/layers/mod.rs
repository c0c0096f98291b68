//! Decorator layers.
//!
//! Each layer is a [`tower::Layer`] whose service is itself a
//! [`Broker`](crate::Broker), so a full stack composes with
//! `ServiceBuilder`:
//!
//! ```rust,ignore
//! let broker = ServiceBuilder::new()
//!     .layer(ValidationLayer::new(schema))
//!     .layer(ProtocolLayer::new(ProtocolConfig::default()))
//!     .layer(SerializationLayer::new(JsonSerializer))
//!     .service(TransportBroker::new(transport, config));
//! ```
//!
//! Validation sits closest to the handler, serialization closest to the
//! transport.

mod protocol;
mod serialization;
mod validation;

pub use protocol::{ProtocolBroker, ProtocolConfig, ProtocolLayer};
pub use serialization::{
    JsonSerializer, MessagePackSerializer, SerializationLayer, Serializer, SerializingBroker,
};
pub use validation::{
    validated, JsonKind, ObjectSchema, ValidatingBroker, ValidationLayer, Validator,
};
