//! Event Gateway server binary.

use event_gateway_events::{EventRegistry, EventService, JsonSchemaValidator};
use event_gateway_server::{
    AppState, BrokerConfig, CONFIG_ENV, GatewayServer, load_config_or_default,
    resolve_config_path, unresolved_schemas,
};
#[cfg(feature = "kafka")]
use event_gateway_server::ensure_topics_or_warn;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "kafka")]
use event_gateway_events::{
    BrokerPublisher, KafkaChannelFactory, KafkaConfig, KafkaTopicProvisioner, PublisherConfig,
};
#[cfg(not(feature = "kafka"))]
use event_gateway_events::MemoryPublisher;

#[cfg(feature = "kafka")]
type Publisher = BrokerPublisher<KafkaChannelFactory>;
#[cfg(not(feature = "kafka"))]
type Publisher = MemoryPublisher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let path = resolve_config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = load_config_or_default(&path)?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!(config = %path.display(), "Starting event gateway");

    // Routing table and schemas
    let registry = Arc::new(EventRegistry::from_file(
        config.registry.channels_path.clone(),
    )?);
    let validator = JsonSchemaValidator::from_dir(&config.schema.dir, registry.clone())?;
    for (event_type, schema) in unresolved_schemas(&registry, &validator) {
        tracing::warn!(
            event_type = %event_type,
            schema = %schema,
            "Channel names a schema that is not loaded; its events will be rejected"
        );
    }

    let publisher = Arc::new(build_publisher(&config.broker, registry.clone()).await?);
    let service = EventService::new(Arc::new(validator), publisher.clone());

    // Create and run server
    let server = GatewayServer::new(config.server.clone(), AppState::new(service, registry));
    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    #[cfg(feature = "kafka")]
    publisher.close().await?;

    Ok(())
}

#[cfg(feature = "kafka")]
async fn build_publisher(
    broker: &BrokerConfig,
    registry: Arc<EventRegistry>,
) -> Result<Publisher, Box<dyn std::error::Error>> {
    let mut kafka = KafkaConfig::new(broker.brokers.clone());
    kafka.message_timeout = broker.delivery_timeout();

    if broker.ensure_topics {
        let topics = registry.channels_of_kind("kafka");
        ensure_topics_or_warn(&topics, async {
            KafkaTopicProvisioner::new(&kafka)?
                .ensure_topics(&topics)
                .await
        })
        .await;
    }

    Ok(BrokerPublisher::with_config(
        registry,
        KafkaChannelFactory::new(kafka),
        PublisherConfig::new().delivery_timeout(broker.delivery_timeout()),
    ))
}

#[cfg(not(feature = "kafka"))]
async fn build_publisher(
    broker: &BrokerConfig,
    registry: Arc<EventRegistry>,
) -> Result<Publisher, Box<dyn std::error::Error>> {
    tracing::warn!(
        brokers = ?broker.brokers,
        "Built without the `kafka` feature; accepted events are kept in memory only"
    );
    if broker.ensure_topics {
        tracing::warn!("`broker.ensure_topics` has no effect without the `kafka` feature");
    }
    Ok(MemoryPublisher::with_resolver(registry))
}
