//! Gateway error types.
//!
//! Every error carries an [`ErrorKind`] so transports can pick a response
//! class by value instead of matching on message text.

use std::time::Duration;

use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Coarse classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Routing table or schema set failed to load.
    Config,
    /// Event type is absent from the routing table.
    ChannelNotFound,
    /// Routing table names a schema that was never loaded.
    SchemaNotFound,
    /// Payload violates its schema.
    Validation,
    /// Broker delivery failed or timed out.
    Publish,
}

impl ErrorKind {
    /// Returns a short stable label (snake_case) for logs and response bodies.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config_error",
            ErrorKind::ChannelNotFound => "channel_not_found",
            ErrorKind::SchemaNotFound => "schema_not_found",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Publish => "publish_error",
        }
    }

    /// Returns true if the producer of the event is at fault (or the failure
    /// is surfaced as if it were).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::ChannelNotFound | ErrorKind::SchemaNotFound | ErrorKind::Validation
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Error type for the validate-route-publish pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Registry or schema set could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// No channel registered for the event type.
    #[error("Channel not found for event type '{event_type}'")]
    ChannelNotFound { event_type: String },

    /// The channel's schema was not loaded.
    #[error("No schema '{schema}' loaded for event type '{event_type}'")]
    SchemaNotFound { schema: String, event_type: String },

    /// Payload failed one or more schema constraints.
    #[error("Validation failed for event type '{event_type}': {}", reasons.join("; "))]
    Validation {
        event_type: String,
        reasons: Vec<String>,
    },

    /// Broker unreachable, rejected the message, or encoding failed.
    #[error("Failed to publish to '{endpoint}': {message}")]
    Publish { endpoint: String, message: String },

    /// Broker did not acknowledge within the delivery deadline.
    #[error("Publish to '{endpoint}' timed out after {timeout:?}")]
    PublishTimeout { endpoint: String, timeout: Duration },
}

impl GatewayError {
    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new channel-not-found error.
    pub fn channel_not_found(event_type: impl Into<String>) -> Self {
        Self::ChannelNotFound {
            event_type: event_type.into(),
        }
    }

    /// Creates a new publish error.
    pub fn publish(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::ChannelNotFound { .. } => ErrorKind::ChannelNotFound,
            Self::SchemaNotFound { .. } => ErrorKind::SchemaNotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Publish { .. } | Self::PublishTimeout { .. } => ErrorKind::Publish,
        }
    }

    /// Returns true if this is a client-class error.
    pub fn is_client_error(&self) -> bool {
        self.kind().is_client_error()
    }

    /// Returns true if the broker deadline was exceeded.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::PublishTimeout { .. })
    }

    /// Violated constraints for validation errors, empty otherwise.
    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Validation { reasons, .. } => reasons,
            _ => &[],
        }
    }

    /// Returns an HTTP status code appropriate for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::ChannelNotFound { .. } => 404,
            Self::SchemaNotFound { .. } => 422,
            Self::Publish { .. } => 502,
            Self::PublishTimeout { .. } => 504,
            Self::Config { .. } => 500,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(format!("JSON error: {}", err))
    }
}
