// Kafka delivery channels and topic provisioning.
//
// Compiled only with the `kafka` feature, which links librdkafka.

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;

use super::broker::{ChannelFactory, DeliveryChannel, OutboundMessage};
use crate::error::{GatewayError, GatewayResult};

/// Kafka connection settings.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Bootstrap brokers, e.g. `["localhost:9092"]`.
    pub brokers: Vec<String>,
    /// Required acknowledgments (`acks`).
    pub acks: String,
    /// Producer linger before sending a batch.
    pub linger: Duration,
    /// How long librdkafka keeps retrying a message internally.
    pub message_timeout: Duration,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            acks: "1".to_string(),
            linger: Duration::from_millis(10),
            message_timeout: Duration::from_secs(5),
        }
    }
}

impl KafkaConfig {
    /// Creates a configuration for the given brokers.
    pub fn new(brokers: Vec<String>) -> Self {
        Self {
            brokers,
            ..Self::default()
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", self.brokers.join(","));
        config
    }

    fn producer_config(&self) -> ClientConfig {
        let mut config = self.client_config();
        config
            .set("acks", &self.acks)
            .set("linger.ms", self.linger.as_millis().to_string())
            .set(
                "message.timeout.ms",
                self.message_timeout.as_millis().to_string(),
            );
        config
    }
}

/// A producer bound to one topic.
pub struct KafkaChannel {
    topic: String,
    producer: FutureProducer,
}

impl KafkaChannel {
    /// Returns the topic this channel writes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl DeliveryChannel for KafkaChannel {
    async fn send(&self, message: &OutboundMessage) -> GatewayResult<()> {
        let headers = message
            .headers
            .iter()
            .fold(OwnedHeaders::new(), |headers, (key, value)| {
                headers.insert(Header {
                    key: key.as_str(),
                    value: Some(value.as_slice()),
                })
            });

        let record = FutureRecord::<(), [u8]>::to(&self.topic)
            .payload(message.value.as_slice())
            .timestamp(message.timestamp.timestamp_millis())
            .headers(headers);

        // The caller bounds the wait; do not give up while enqueueing.
        self.producer
            .send(record, Timeout::Never)
            .await
            .map(|_| ())
            .map_err(|(e, _)| {
                GatewayError::publish(
                    &self.topic,
                    format!("failed to publish to kafka topic: {}", e),
                )
            })
    }

    async fn close(&self) -> GatewayResult<()> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(Duration::from_secs(5))))
            .await
            .map_err(|e| GatewayError::publish(&topic, format!("flush task failed: {}", e)))?
            .map_err(|e| GatewayError::publish(&topic, format!("failed to flush producer: {}", e)))
    }
}

/// Opens one Kafka producer per topic.
#[derive(Debug, Clone, Default)]
pub struct KafkaChannelFactory {
    config: KafkaConfig,
}

impl KafkaChannelFactory {
    /// Creates a factory with the given settings.
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChannelFactory for KafkaChannelFactory {
    type Channel = KafkaChannel;

    async fn open(&self, endpoint: &str) -> GatewayResult<KafkaChannel> {
        let producer: FutureProducer = self.config.producer_config().create().map_err(|e| {
            GatewayError::publish(endpoint, format!("failed to create kafka producer: {}", e))
        })?;

        Ok(KafkaChannel {
            topic: endpoint.to_string(),
            producer,
        })
    }
}

/// Creates missing topics (one partition, replication factor one).
///
/// Meant for development clusters; production topics are provisioned
/// out of band.
pub struct KafkaTopicProvisioner {
    admin: AdminClient<DefaultClientContext>,
}

impl KafkaTopicProvisioner {
    /// Connects an admin client to the configured brokers.
    pub fn new(config: &KafkaConfig) -> GatewayResult<Self> {
        let admin = config
            .client_config()
            .create()
            .map_err(|e| GatewayError::config(format!("failed to create kafka admin client: {}", e)))?;
        Ok(Self { admin })
    }

    /// Ensures every topic exists. Returns the topics that were created.
    pub async fn ensure_topics(&self, topics: &[String]) -> GatewayResult<Vec<String>> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }

        let new_topics: Vec<NewTopic<'_>> = topics
            .iter()
            .map(|topic| NewTopic::new(topic, 1, TopicReplication::Fixed(1)))
            .collect();
        let options = AdminOptions::new().operation_timeout(Some(Duration::from_secs(5)));

        let results = self
            .admin
            .create_topics(&new_topics, &options)
            .await
            .map_err(|e| GatewayError::publish("<admin>", format!("create topics failed: {}", e)))?;

        let mut created = Vec::new();
        for result in results {
            match result {
                Ok(topic) => {
                    tracing::info!(topic = %topic, "Created Kafka topic");
                    created.push(topic);
                }
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(topic = %topic, "Kafka topic already exists");
                }
                Err((topic, code)) => {
                    tracing::warn!(topic = %topic, error = %code, "Failed to create Kafka topic");
                }
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KafkaConfig::default();
        assert_eq!(config.brokers, vec!["localhost:9092"]);
        assert_eq!(config.acks, "1");
        assert_eq!(config.linger, Duration::from_millis(10));
    }

    #[test]
    fn test_producer_config() {
        let config = KafkaConfig::new(vec!["a:9092".into(), "b:9092".into()]).producer_config();
        assert_eq!(config.get("bootstrap.servers"), Some("a:9092,b:9092"));
        assert_eq!(config.get("linger.ms"), Some("10"));
        assert_eq!(config.get("message.timeout.ms"), Some("5000"));
    }
}
