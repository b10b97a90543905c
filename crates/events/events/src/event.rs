//! Event types and structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};

/// A typed event submitted for validation and routing.
///
/// `event_type` selects both the channel and the payload schema. Only the
/// payload is ever validated; `id` and `timestamp` pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event instance.
    #[serde(default = "generate_id")]
    pub id: String,
    /// The registered event type (e.g. "OrderStatusEvent").
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the event happened.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Event {
    /// Creates a new event with a generated id and the current time.
    pub fn new(event_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            id: generate_id(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Creates an event from an arbitrary JSON value, which must be an object.
    pub fn from_json(event_type: impl Into<String>, payload: Value) -> GatewayResult<Self> {
        let event_type = event_type.into();
        match payload {
            Value::Object(map) => Ok(Self::new(event_type, map)),
            other => Err(GatewayError::Validation {
                event_type,
                reasons: vec![format!(
                    "(root): payload must be an object, got {}",
                    json_type_name(&other)
                )],
            }),
        }
    }

    /// Replaces the generated id with a caller-supplied one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the event timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the payload as a JSON value.
    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    /// Deserializes the payload to a specific type.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        serde_json::from_value(self.payload_value()).ok()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
