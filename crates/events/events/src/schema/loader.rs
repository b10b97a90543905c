use std::collections::HashMap;
use std::path::Path;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};

const SCHEMA_SUFFIX: &str = ".schema.json";

/// Immutable set of compiled JSON schemas keyed by schema name.
pub struct SchemaSet {
    schemas: HashMap<String, Validator>,
}

impl SchemaSet {
    /// Loads and compiles every `*.json` document in `dir`.
    ///
    /// `order_status.schema.json` is registered as `order_status`; any other
    /// `name.json` as `name`. Subdirectories and non-JSON files are skipped.
    pub fn load_dir(dir: impl AsRef<Path>) -> GatewayResult<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            GatewayError::config(format!(
                "cannot read schema directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut schemas = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                GatewayError::config(format!(
                    "cannot read schema directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = schema_name(file_name) else {
                continue;
            };

            let content = std::fs::read_to_string(&path).map_err(|e| {
                GatewayError::config(format!("cannot read schema {}: {}", file_name, e))
            })?;
            let document: Value = serde_json::from_str(&content).map_err(|e| {
                GatewayError::config(format!("cannot parse schema {}: {}", file_name, e))
            })?;

            schemas.insert(name.to_string(), compile(file_name, &document)?);
            tracing::debug!(schema = name, file = file_name, "Compiled schema");
        }

        tracing::info!(
            dir = %dir.display(),
            schemas = schemas.len(),
            "Loaded schema set"
        );
        Ok(Self { schemas })
    }

    /// Builds a set from in-memory documents.
    pub fn from_documents<I, S>(documents: I) -> GatewayResult<Self>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut schemas = HashMap::new();
        for (name, document) in documents {
            let name = name.into();
            let validator = compile(&name, &document)?;
            schemas.insert(name, validator);
        }
        Ok(Self { schemas })
    }

    /// Gets a compiled schema by name.
    pub fn get(&self, name: &str) -> Option<&Validator> {
        self.schemas.get(name)
    }

    /// Checks if a schema with this name was loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Returns all schema names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of loaded schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Checks if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl std::fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSet")
            .field("names", &self.names())
            .finish()
    }
}

fn schema_name(file_name: &str) -> Option<&str> {
    if let Some(stem) = file_name.strip_suffix(SCHEMA_SUFFIX) {
        return (!stem.is_empty()).then_some(stem);
    }
    file_name
        .strip_suffix(".json")
        .filter(|stem| !stem.is_empty())
}

fn compile(origin: &str, document: &Value) -> GatewayResult<Validator> {
    jsonschema::validator_for(document)
        .map_err(|e| GatewayError::config(format!("failed to compile schema {}: {}", origin, e)))
}
