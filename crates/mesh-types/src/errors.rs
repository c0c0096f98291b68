//! # Error Types
//!
//! `BrokerError` is the single failure type surfaced by brokers and layers.
//! `ErrorObject` is its wire form: a recursive `{name, message, stack, cause}`
//! chain that survives a process boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Wire form of an error and its cause chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorObject {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub stack: String,
    /// Stack of this error alone, before cause lines were appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<Box<ErrorObject>>,
}

impl ErrorObject {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        let message = message.into();
        let stack = format!("{name}: {message}");
        Self {
            name,
            message,
            stack,
            own_stack: None,
            cause: None,
            root_cause: None,
        }
    }

    /// Attach `cause` under this error.
    ///
    /// `root_cause` becomes the deepest error of the resulting chain and
    /// `stack` gains a `Cause:` line per level.
    pub fn caused_by(mut self, cause: ErrorObject) -> Self {
        let own = self.own_stack.take().unwrap_or_else(|| self.stack.clone());
        self.stack = format!("{own}\nCause: {}", cause.stack);
        self.own_stack = Some(own);
        let root = match &cause.root_cause {
            Some(root) => root.as_ref().clone(),
            None => cause.clone(),
        };
        self.root_cause = Some(Box::new(root));
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn cause(&self) -> Option<&ErrorObject> {
        self.cause.as_deref()
    }

    pub fn root_cause(&self) -> Option<&ErrorObject> {
        self.root_cause.as_deref()
    }

    /// This error followed by every cause, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorObject> {
        std::iter::successors(Some(self), |e| e.cause())
    }

    /// Capture any `std::error::Error` together with its `source()` chain.
    ///
    /// Levels that are a [`BrokerError`] or an `ErrorObject` keep their own
    /// name and chain; any other level is named `Error`.
    pub fn from_std(err: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(broker) = err.downcast_ref::<BrokerError>() {
            return broker.to_object();
        }
        if let Some(object) = err.downcast_ref::<ErrorObject>() {
            return object.clone();
        }
        let object = Self::new("Error", err.to_string());
        match err.source() {
            Some(source) => object.caused_by(Self::from_std(source)),
            None => object,
        }
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ErrorObject {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Input rejected by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .issues.join("; "))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            issues: vec![message.into()],
        }
    }

    pub fn with_issues(issues: Vec<String>) -> Self {
        Self { issues }
    }
}

/// Every failure a broker, layer or transport can surface.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Malformed envelope or payload shape.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported protocol: expected {expected}, received {received}")]
    UnsupportedProtocol { expected: String, received: String },

    #[error("wrong envelope type: expected {expected}, received {received}")]
    WrongType { expected: String, received: String },

    /// The remote side answered with an error; the remote chain is the source.
    #[error("error response")]
    Response(#[source] ErrorObject),

    /// Failure raised by application handler code.
    #[error(transparent)]
    Handler(ErrorObject),

    /// Opaque replacement used when the error mapper scrubs an error.
    #[error("{0}")]
    RemoteMethod(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("request to {topic} timed out after {timeout_ms}ms")]
    Timeout { topic: String, timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("broker is already started")]
    AlreadyStarted,

    #[error("broker is not started yet")]
    NotStarted,
}

impl BrokerError {
    /// Application failure with a chosen name, e.g. `BrokerError::handler("DivisionByZero", "b is 0")`.
    pub fn handler(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler(ErrorObject::new(name, message))
    }

    /// Generic error returned when the error mapper discards the original.
    pub fn remote_method() -> Self {
        Self::RemoteMethod("failed to handle request".to_string())
    }

    /// Stable name used on the wire and for name matching by callers.
    pub fn name(&self) -> &str {
        match self {
            Self::Parse(_) => "ParseError",
            Self::UnsupportedProtocol { .. } => "UnsupportedProtocolError",
            Self::WrongType { .. } => "WrongTypeError",
            Self::Response(_) => "ResponseError",
            Self::Handler(object) => &object.name,
            Self::RemoteMethod(_) => "RemoteMethodError",
            Self::Validation(_) => "ValidationError",
            Self::Serialization(_) => "SerializationError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Transport(_) => "TransportError",
            Self::AlreadyStarted | Self::NotStarted => "BrokerError",
        }
    }

    /// The rebuilt remote error of a `Response`.
    pub fn remote_cause(&self) -> Option<&ErrorObject> {
        match self {
            Self::Response(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Wire form, preserving any cause chain.
    pub fn to_object(&self) -> ErrorObject {
        match self {
            Self::Handler(object) => object.clone(),
            Self::Response(remote) => {
                ErrorObject::new(self.name(), self.to_string()).caused_by(remote.clone())
            }
            _ => ErrorObject::new(self.name(), self.to_string()),
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<ErrorObject> for BrokerError {
    fn from(object: ErrorObject) -> Self {
        Self::Handler(object)
    }
}
