//! Payload and handler contracts.

use bytes::Bytes;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::errors::BrokerError;

/// A value that can travel through a broker.
///
/// Every payload type designates a "no payload" sentinel which every layer
/// must round-trip unchanged.
pub trait Payload: Clone + Send + Sync + 'static {
    fn none() -> Self;
    fn is_none(&self) -> bool;
}

impl Payload for Value {
    fn none() -> Self {
        Value::Null
    }

    fn is_none(&self) -> bool {
        self.is_null()
    }
}

impl Payload for Bytes {
    fn none() -> Self {
        Bytes::new()
    }

    fn is_none(&self) -> bool {
        self.is_empty()
    }
}

/// Future returned by a handler.
pub type HandlerFuture<P> = BoxFuture<'static, Result<P, BrokerError>>;

/// Request or notification handler, invoked with the payload and the
/// concrete topic it arrived on.
pub trait Handler<P>: Send + Sync + 'static {
    fn call(&self, input: P, topic: String) -> HandlerFuture<P>;
}

impl<P, F, Fut> Handler<P> for F
where
    P: Send + 'static,
    F: Fn(P, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<P, BrokerError>> + Send + 'static,
{
    fn call(&self, input: P, topic: String) -> HandlerFuture<P> {
        Box::pin((self)(input, topic))
    }
}

pub type SharedHandler<P> = Arc<dyn Handler<P>>;

/// Box an async closure as a [`SharedHandler`].
///
/// ```rust,ignore
/// broker.handle_request("math.double", handler_fn(|x: Value, _topic| async move {
///     Ok(json!(x.as_i64().unwrap_or_default() * 2))
/// }));
/// ```
pub fn handler_fn<P, F, Fut>(f: F) -> SharedHandler<P>
where
    P: Send + 'static,
    F: Fn(P, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<P, BrokerError>> + Send + 'static,
{
    Arc::new(f)
}
