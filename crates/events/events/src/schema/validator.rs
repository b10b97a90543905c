use std::path::Path;
use std::sync::Arc;

use crate::error::{GatewayError, GatewayResult};
use crate::event::Event;
use crate::registry::ChannelResolver;
use crate::schema::SchemaSet;

/// Trait for checking an event's payload before it is published.
pub trait EventValidator: Send + Sync {
    /// Validates the event, returning every violated constraint on failure.
    fn validate(&self, event: &Event) -> GatewayResult<()>;
}

/// Validates payloads against the JSON schema named by the event's channel.
///
/// The schema set is compiled once at construction and never reloaded;
/// only the type to schema-name mapping follows registry reloads.
pub struct JsonSchemaValidator {
    schemas: SchemaSet,
    resolver: Arc<dyn ChannelResolver>,
}

impl JsonSchemaValidator {
    /// Creates a validator over an already compiled schema set.
    pub fn new(schemas: SchemaSet, resolver: Arc<dyn ChannelResolver>) -> Self {
        Self { schemas, resolver }
    }

    /// Loads every schema document in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>, resolver: Arc<dyn ChannelResolver>) -> GatewayResult<Self> {
        Ok(Self::new(SchemaSet::load_dir(dir)?, resolver))
    }

    /// Returns the loaded schema set.
    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    /// Returns the loaded schema names, sorted.
    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.names()
    }
}

impl EventValidator for JsonSchemaValidator {
    fn validate(&self, event: &Event) -> GatewayResult<()> {
        let (_, schema_name) = self.resolver.resolve_channel(&event.event_type)?;

        let schema = self
            .schemas
            .get(&schema_name)
            .ok_or_else(|| GatewayError::SchemaNotFound {
                schema: schema_name.clone(),
                event_type: event.event_type.clone(),
            })?;

        let payload = event.payload_value();
        let reasons: Vec<String> = schema
            .iter_errors(&payload)
            .map(|error| {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "(root)".to_string() } else { path };
                format!("{}: {}", path, error)
            })
            .collect();

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Validation {
                event_type: event.event_type.clone(),
                reasons,
            })
        }
    }
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schemas", &self.schemas)
            .finish()
    }
}
