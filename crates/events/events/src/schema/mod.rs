//! Payload schemas and validation
//!
//! - Loading and compiling a directory of JSON Schema documents
//! - Validating event payloads against the schema named by their channel

mod loader;
mod validator;

pub use loader::SchemaSet;
pub use validator::{EventValidator, JsonSchemaValidator};
