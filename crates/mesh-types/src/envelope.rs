//! # Envelope Protocol
//!
//! Every message framed by the protocol layer travels as an [`Envelope`]:
//!
//! ```text
//! { "protocol": "mesh.1", "type": "request"|"notification"|"event"|"response",
//!   "id": "<uuid>", "requestId": "<uuid>", "timestamp": <ms>,
//!   "input": ..., "output": ..., "error": { name, message, stack, cause?, rootCause? } }
//! ```
//!
//! ## Parsing order
//!
//! 1. The value must be a plain JSON object (`ParseError`).
//! 2. `protocol` must equal [`PROTOCOL_VERSION`] (`UnsupportedProtocolError`).
//! 3. `type` must be the one the call site expects (`WrongTypeError`).
//!
//! `notification` and `event` name the same message class; the notification
//! parser accepts both.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::errors::{BrokerError, ErrorObject};

/// Protocol tag carried by every envelope.
pub const PROTOCOL_VERSION: &str = "mesh.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Request,
    Notification,
    Event,
    Response,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Notification => "notification",
            Self::Event => "event",
            Self::Response => "response",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "request" => Some(Self::Request),
            "notification" => Some(Self::Notification),
            "event" => Some(Self::Event),
            "response" => Some(Self::Response),
            _ => None,
        }
    }

    /// Whether an envelope of kind `self` satisfies a parser expecting `expected`.
    fn satisfies(self, expected: EnvelopeKind) -> bool {
        match expected {
            Self::Notification | Self::Event => matches!(self, Self::Notification | Self::Event),
            other => self == other,
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A framed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub protocol: String,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// For responses: the `id` of the request being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Envelope {
    fn new(kind: EnvelopeKind) -> Self {
        Self {
            protocol: PROTOCOL_VERSION.to_string(),
            kind,
            id: Some(Uuid::new_v4()),
            request_id: None,
            timestamp: Some(now_millis()),
            input: Value::Null,
            output: Value::Null,
            error: None,
        }
    }

    /// Validate a raw value as an envelope of the `expected` kind.
    pub fn parse(value: Value, expected: EnvelopeKind) -> Result<Self, BrokerError> {
        let Some(object) = value.as_object() else {
            return Err(BrokerError::Parse("envelope must be a plain object".to_string()));
        };

        let protocol = object.get("protocol").and_then(Value::as_str);
        if protocol != Some(PROTOCOL_VERSION) {
            return Err(BrokerError::UnsupportedProtocol {
                expected: PROTOCOL_VERSION.to_string(),
                received: protocol.unwrap_or("<missing>").to_string(),
            });
        }

        let raw_kind = object.get("type").and_then(Value::as_str).unwrap_or("<missing>");
        match EnvelopeKind::parse(raw_kind) {
            Some(kind) if kind.satisfies(expected) => {}
            _ => {
                return Err(BrokerError::WrongType {
                    expected: expected.to_string(),
                    received: raw_kind.to_string(),
                })
            }
        }

        serde_json::from_value(value)
            .map_err(|e| BrokerError::Parse(format!("malformed envelope: {e}")))
    }

    pub fn into_value(self) -> Result<Value, BrokerError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Output of a response, or the remote error it carries.
    ///
    /// `output` is ignored when `error` is present.
    pub fn into_output(self) -> Result<Value, BrokerError> {
        match self.error {
            Some(error) => Err(BrokerError::Response(error)),
            None => Ok(self.output),
        }
    }
}

pub fn build_request_envelope(input: Value) -> Envelope {
    Envelope {
        input,
        ..Envelope::new(EnvelopeKind::Request)
    }
}

pub fn build_notification_envelope(input: Value) -> Envelope {
    Envelope {
        input,
        ..Envelope::new(EnvelopeKind::Notification)
    }
}

pub fn build_event_envelope(input: Value) -> Envelope {
    Envelope {
        input,
        ..Envelope::new(EnvelopeKind::Event)
    }
}

/// Response to the request identified by `request_id`.
pub fn build_response_envelope(
    request_id: Option<Uuid>,
    result: Result<Value, ErrorObject>,
) -> Envelope {
    let mut envelope = Envelope {
        request_id,
        ..Envelope::new(EnvelopeKind::Response)
    };
    match result {
        Ok(output) => envelope.output = output,
        Err(error) => envelope.error = Some(error),
    }
    envelope
}

pub fn parse_request_envelope(value: Value) -> Result<Envelope, BrokerError> {
    Envelope::parse(value, EnvelopeKind::Request)
}

pub fn parse_notification_envelope(value: Value) -> Result<Envelope, BrokerError> {
    Envelope::parse(value, EnvelopeKind::Notification)
}

/// Parse a response and unwrap it into the output or a `Response` error.
pub fn parse_response_envelope(value: Value) -> Result<Value, BrokerError> {
    Envelope::parse(value, EnvelopeKind::Response)?.into_output()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
