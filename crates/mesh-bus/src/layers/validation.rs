//! Validation layer: handlers only ever observe validated input.
//!
//! A rejected input fails with [`BrokerError::Validation`] before the
//! handler runs. Behind a protocol layer this reaches the caller as a
//! `ResponseError` whose cause is named `ValidationError`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::Layer;
use tracing::debug;

use mesh_types::{handler_fn, BrokerError, SharedHandler, ValidationError};

use crate::broker::Broker;

/// Checks the input of a handler for `topic`.
pub trait Validator: Send + Sync + 'static {
    fn validate(&self, topic: &str, input: &Value) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(&str, &Value) -> Result<(), ValidationError> + Send + Sync + 'static,
{
    fn validate(&self, topic: &str, input: &Value) -> Result<(), ValidationError> {
        self(topic, input)
    }
}

/// JSON value kinds an [`ObjectSchema`] field may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    Integer,
    String,
    Array,
    Object,
    Any,
}

impl JsonKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }
}

#[derive(Debug, Clone)]
struct FieldRule {
    kind: JsonKind,
    required: bool,
}

/// Schema for object inputs.
///
/// ```rust,ignore
/// let schema = ObjectSchema::new()
///     .required("user", JsonKind::String)
///     .optional("age", JsonKind::Integer);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    fields: BTreeMap<String, FieldRule>,
    allow_unknown: bool,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, kind: JsonKind) -> Self {
        self.fields.insert(name.into(), FieldRule { kind, required: true });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: JsonKind) -> Self {
        self.fields.insert(name.into(), FieldRule { kind, required: false });
        self
    }

    /// Accept keys the schema does not name.
    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    fn check(&self, object: &Map<String, Value>) -> Vec<String> {
        let mut issues = Vec::new();

        for (name, rule) in &self.fields {
            match object.get(name) {
                None if rule.required => issues.push(format!("missing field `{name}`")),
                None => {}
                Some(value) if !rule.kind.accepts(value) => issues.push(format!(
                    "field `{name}` must be {}",
                    rule.kind.as_str()
                )),
                Some(_) => {}
            }
        }

        if !self.allow_unknown {
            issues.extend(
                object
                    .keys()
                    .filter(|key| !self.fields.contains_key(*key))
                    .map(|key| format!("unknown field `{key}`")),
            );
        }
        issues
    }
}

impl Validator for ObjectSchema {
    fn validate(&self, _topic: &str, input: &Value) -> Result<(), ValidationError> {
        let Some(object) = input.as_object() else {
            return Err(ValidationError::new("input must be an object"));
        };
        let issues = self.check(object);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::with_issues(issues))
        }
    }
}

/// Wrap one handler so it only runs on input `validator` accepts.
pub fn validated<V: Validator>(validator: Arc<V>, handler: SharedHandler<Value>) -> SharedHandler<Value> {
    handler_fn(move |input: Value, topic: String| {
        let validator = Arc::clone(&validator);
        let handler = Arc::clone(&handler);
        async move {
            if let Err(e) = validator.validate(&topic, &input) {
                debug!(topic = %topic, error = %e, "Rejected invalid input");
                return Err(BrokerError::Validation(e));
            }
            handler.call(input, topic).await
        }
    })
}

#[derive(Debug, Clone)]
pub struct ValidationLayer<V> {
    validator: Arc<V>,
}

impl<V: Validator> ValidationLayer<V> {
    pub fn new(validator: V) -> Self {
        Self {
            validator: Arc::new(validator),
        }
    }
}

impl<B, V> Layer<B> for ValidationLayer<V> {
    type Service = ValidatingBroker<B, V>;

    fn layer(&self, inner: B) -> Self::Service {
        ValidatingBroker {
            inner,
            validator: Arc::clone(&self.validator),
        }
    }
}

/// Validates handler input for every registration; outbound calls pass
/// through untouched.
pub struct ValidatingBroker<B, V> {
    inner: B,
    validator: Arc<V>,
}

impl<B, V: Validator> ValidatingBroker<B, V> {
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn wrap(&self, handler: SharedHandler<Value>) -> SharedHandler<Value> {
        validated(Arc::clone(&self.validator), handler)
    }
}

#[async_trait]
impl<B, V> Broker<Value> for ValidatingBroker<B, V>
where
    B: Broker<Value>,
    V: Validator,
{
    fn handle_request(&self, pattern: &str, handler: SharedHandler<Value>) {
        self.inner.handle_request(pattern, self.wrap(handler));
    }

    fn handle_notification(&self, pattern: &str, handler: SharedHandler<Value>) {
        self.inner.handle_notification(pattern, self.wrap(handler));
    }

    fn handle_notification_in_group(&self, pattern: &str, group: &str, handler: SharedHandler<Value>) {
        self.inner
            .handle_notification_in_group(pattern, group, self.wrap(handler));
    }

    async fn request(&self, topic: &str, input: Value) -> Result<Value, BrokerError> {
        self.inner.request(topic, input).await
    }

    async fn notify(&self, topic: &str, input: Value) -> Result<(), BrokerError> {
        self.inner.notify(topic, input).await
    }

    async fn start(&self) -> Result<(), BrokerError> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        self.inner.stop().await
    }
}
