//! # Event Gateway Server
//!
//! Standalone HTTP front end for the event gateway. Producers `POST /event`;
//! operators reload and inspect the channel registry on a separate admin
//! listener.

mod config;
mod routes;

pub use config::{
    BrokerConfig, CONFIG_ENV, ConfigError, DEFAULT_CONFIG_PATH, GatewayConfig, RegistryConfig,
    SchemaConfig, ServerConfig, load_config, load_config_or_default, parse_config,
    resolve_config_path,
};
pub use routes::{AppState, ErrorResponse, admin_routes, event_routes};

use event_gateway_events::{EventRegistry, GatewayResult, JsonSchemaValidator};
use std::future::Future;

/// Routing entries whose schema is not loaded, as `(event_type, schema)`
/// pairs sorted by event type.
///
/// Events of these types are rejected with `SchemaNotFound` until the
/// schema is added and the process restarted.
pub fn unresolved_schemas(
    registry: &EventRegistry,
    validator: &JsonSchemaValidator,
) -> Vec<(String, String)> {
    let table = registry.current();
    let mut missing: Vec<(String, String)> = table
        .channels
        .iter()
        .filter(|(_, info)| !validator.schemas().contains(&info.schema_name))
        .map(|(event_type, info)| (event_type.clone(), info.schema_name.clone()))
        .collect();
    missing.sort();
    missing
}

/// Runs topic provisioning without making its failure fatal.
///
/// Returns the created topics, or nothing if provisioning failed; the
/// gateway keeps serving either way.
pub async fn ensure_topics_or_warn<F>(topics: &[String], provision: F) -> Vec<String>
where
    F: Future<Output = GatewayResult<Vec<String>>>,
{
    match provision.await {
        Ok(created) => {
            tracing::info!(
                requested = topics.len(),
                created = created.len(),
                "Ensured broker topics"
            );
            created
        }
        Err(e) => {
            tracing::warn!(
                requested = topics.len(),
                error = %e,
                "Failed to ensure broker topics, continuing"
            );
            Vec::new()
        }
    }
}

/// The gateway server: one event listener and one admin listener.
pub struct GatewayServer {
    /// Server configuration.
    pub config: ServerConfig,
    state: AppState,
}

impl GatewayServer {
    /// Creates a new gateway server.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serves both listeners until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let event_listener = tokio::net::TcpListener::bind(self.config.event_addr()).await?;
        let admin_listener = tokio::net::TcpListener::bind(self.config.admin_addr()).await?;

        tracing::info!("Event listener on {}", event_listener.local_addr()?);
        tracing::info!("Admin listener on {}", admin_listener.local_addr()?);

        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move {
            shutdown.await;
            let _ = stop_tx.send(true);
        });

        let event_server = axum::serve(event_listener, event_routes(self.state.clone()))
            .with_graceful_shutdown(wait_for_stop(stop_rx.clone()));
        let admin_server = axum::serve(admin_listener, admin_routes(self.state.clone()))
            .with_graceful_shutdown(wait_for_stop(stop_rx));

        tokio::try_join!(
            async { event_server.await },
            async { admin_server.await }
        )?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn wait_for_stop(mut stop: tokio::sync::watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_gateway_events::{GatewayError, MemoryChannelSource, SchemaSet};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_unresolved_schemas() {
        let registry = Arc::new(
            EventRegistry::load(MemoryChannelSource::new(
                r#"{
                    "OrderStatusEvent": {"endpoint": "order-topic", "schema": "order_status", "type": "kafka"},
                    "RefundEvent": {"endpoint": "refund-topic", "schema": "refund", "type": "kafka"},
                    "AuditEvent": {"endpoint": "audit-topic", "schema": "audit", "type": "kafka"}
                }"#,
            ))
            .unwrap(),
        );
        let schemas = SchemaSet::from_documents([("order_status", json!({"type": "object"}))]).unwrap();
        let validator = JsonSchemaValidator::new(schemas, registry.clone());

        assert_eq!(
            unresolved_schemas(&registry, &validator),
            vec![
                ("AuditEvent".to_string(), "audit".to_string()),
                ("RefundEvent".to_string(), "refund".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_topic_provisioning_failure_is_not_fatal() {
        let topics = vec!["order-topic".to_string()];

        let created = ensure_topics_or_warn(&topics, async {
            Err::<Vec<String>, _>(GatewayError::config("failed to create kafka admin client"))
        })
        .await;
        assert!(created.is_empty());

        let created = ensure_topics_or_warn(&topics, async {
            Ok::<_, GatewayError>(vec!["order-topic".to_string()])
        })
        .await;
        assert_eq!(created, vec!["order-topic"]);
    }
}
