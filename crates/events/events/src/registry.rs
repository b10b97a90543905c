//! Channel registry: the hot-reloadable routing table.
//!
//! The table is an immutable [`ChannelTable`] behind an [`ArcSwap`]. Readers
//! never block; a reload reads and parses the source first and only then
//! swaps the pointer, so every read sees exactly one complete table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Routing entry for one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Broker destination (e.g. a Kafka topic).
    pub endpoint: String,
    /// Key into the validator's schema set.
    #[serde(rename = "schema")]
    pub schema_name: String,
    /// Broker technology, e.g. "kafka".
    #[serde(rename = "type")]
    pub kind: String,
}

impl ChannelInfo {
    /// Creates a new channel entry.
    pub fn new(
        endpoint: impl Into<String>,
        schema_name: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            schema_name: schema_name.into(),
            kind: kind.into(),
        }
    }
}

/// One immutable generation of the routing table.
#[derive(Debug, Clone)]
pub struct ChannelTable {
    /// 1 for the initial load, incremented by every successful reload.
    pub version: u64,
    /// When this generation was loaded.
    pub loaded_at: DateTime<Utc>,
    /// Event type to channel.
    pub channels: HashMap<String, ChannelInfo>,
}

impl ChannelTable {
    fn new(version: u64, channels: HashMap<String, ChannelInfo>) -> Self {
        Self {
            version,
            loaded_at: Utc::now(),
            channels,
        }
    }

    /// Gets the channel for an event type.
    pub fn get(&self, event_type: &str) -> Option<&ChannelInfo> {
        self.channels.get(event_type)
    }

    /// Returns the number of registered event types.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Checks if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Where the routing table comes from.
pub trait ChannelSource: Send + Sync {
    /// Human-readable location, used in errors and logs.
    fn describe(&self) -> String;

    /// Reads and parses the full table.
    fn read(&self) -> GatewayResult<HashMap<String, ChannelInfo>>;
}

fn parse_channels(document: &str, origin: &str) -> GatewayResult<HashMap<String, ChannelInfo>> {
    serde_json::from_str(document).map_err(|e| {
        GatewayError::config(format!("cannot decode channel config {}: {}", origin, e))
    })
}

/// JSON channel file on disk.
#[derive(Debug, Clone)]
pub struct FileChannelSource {
    path: PathBuf,
}

impl FileChannelSource {
    /// Creates a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChannelSource for FileChannelSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> GatewayResult<HashMap<String, ChannelInfo>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            GatewayError::config(format!(
                "cannot open channel config {}: {}",
                self.path.display(),
                e
            ))
        })?;
        parse_channels(&content, &self.describe())
    }
}

/// In-memory JSON document that can be replaced at runtime.
#[derive(Debug)]
pub struct MemoryChannelSource {
    document: RwLock<String>,
}

impl MemoryChannelSource {
    /// Creates a source holding `document`.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: RwLock::new(document.into()),
        }
    }

    /// Creates a source from a typed table.
    pub fn from_channels(channels: &HashMap<String, ChannelInfo>) -> GatewayResult<Self> {
        let document = serde_json::to_string(channels)?;
        Ok(Self::new(document))
    }

    /// Replaces the document; takes effect on the next reload.
    pub fn set(&self, document: impl Into<String>) {
        *self.document.write() = document.into();
    }
}

impl ChannelSource for MemoryChannelSource {
    fn describe(&self) -> String {
        "<memory>".to_string()
    }

    fn read(&self) -> GatewayResult<HashMap<String, ChannelInfo>> {
        let document = self.document.read().clone();
        parse_channels(&document, &self.describe())
    }
}

impl<S: ChannelSource + ?Sized> ChannelSource for Arc<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn read(&self) -> GatewayResult<HashMap<String, ChannelInfo>> {
        (**self).read()
    }
}

/// Resolves an event type to its destination and schema name.
pub trait ChannelResolver: Send + Sync {
    /// Returns `(endpoint, schema_name)` or `ChannelNotFound`.
    fn resolve_channel(&self, event_type: &str) -> GatewayResult<(String, String)>;
}

/// Runtime-reloadable store of channel configuration.
pub struct EventRegistry {
    source: Box<dyn ChannelSource>,
    table: ArcSwap<ChannelTable>,
    /// Serializes reloads against each other; readers never take it.
    reload_lock: Mutex<()>,
}

impl EventRegistry {
    /// Loads the initial table from `source`.
    pub fn load(source: impl ChannelSource + 'static) -> GatewayResult<Self> {
        let channels = source.read()?;
        tracing::info!(
            source = %source.describe(),
            channels = channels.len(),
            "Loaded event registry"
        );

        Ok(Self {
            source: Box::new(source),
            table: ArcSwap::from_pointee(ChannelTable::new(1, channels)),
            reload_lock: Mutex::new(()),
        })
    }

    /// Loads the initial table from a JSON file.
    pub fn from_file(path: impl Into<PathBuf>) -> GatewayResult<Self> {
        Self::load(FileChannelSource::new(path))
    }

    /// Re-reads the source and swaps in the new table.
    ///
    /// On failure the current table stays in effect. Returns the new version.
    pub fn reload(&self) -> GatewayResult<u64> {
        let _guard = self.reload_lock.lock();

        let channels = match self.source.read() {
            Ok(channels) => channels,
            Err(e) => {
                tracing::warn!(
                    source = %self.source.describe(),
                    error = %e,
                    "Event registry reload failed, keeping version {}",
                    self.version()
                );
                return Err(e);
            }
        };

        let version = self.table.load().version + 1;
        let count = channels.len();
        self.table.store(Arc::new(ChannelTable::new(version, channels)));

        tracing::info!(version, channels = count, "Event registry reloaded");
        Ok(version)
    }

    /// Returns the current table generation.
    pub fn current(&self) -> Arc<ChannelTable> {
        self.table.load_full()
    }

    /// Returns the current table version.
    pub fn version(&self) -> u64 {
        self.table.load().version
    }

    /// Returns an independent copy of the current table.
    pub fn snapshot(&self) -> HashMap<String, ChannelInfo> {
        self.table.load().channels.clone()
    }

    /// Distinct endpoints of every channel with the given broker kind.
    pub fn channels_of_kind(&self, kind: &str) -> Vec<String> {
        let table = self.table.load();
        let mut endpoints: Vec<String> = table
            .channels
            .values()
            .filter(|c| c.kind == kind)
            .map(|c| c.endpoint.clone())
            .collect();
        endpoints.sort();
        endpoints.dedup();
        endpoints
    }
}

impl ChannelResolver for EventRegistry {
    fn resolve_channel(&self, event_type: &str) -> GatewayResult<(String, String)> {
        let table = self.table.load();
        let info = table
            .get(event_type)
            .ok_or_else(|| GatewayError::channel_not_found(event_type))?;
        Ok((info.endpoint.clone(), info.schema_name.clone()))
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("source", &self.source.describe())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    const ORDER_CHANNELS: &str = r#"{
        "OrderStatusEvent": {"endpoint": "order-topic", "schema": "order_status", "type": "kafka"}
    }"#;

    fn generation(prefix: &str, size: usize) -> String {
        let channels: HashMap<String, ChannelInfo> = (0..size)
            .map(|i| {
                (
                    format!("Event{}", i),
                    ChannelInfo::new(format!("{}-{}", prefix, i), "schema", "kafka"),
                )
            })
            .collect();
        serde_json::to_string(&channels).unwrap()
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, ORDER_CHANNELS).unwrap();

        let registry = EventRegistry::from_file(&path).unwrap();

        let (endpoint, schema) = registry.resolve_channel("OrderStatusEvent").unwrap();
        assert_eq!(endpoint, "order-topic");
        assert_eq!(schema, "order_status");
        assert_eq!(registry.version(), 1);
    }

    #[test]
    fn test_load_errors_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = EventRegistry::from_file(dir.path().join("nope.json")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Config);

        let malformed = EventRegistry::load(MemoryChannelSource::new("{not json")).unwrap_err();
        assert_eq!(malformed.kind(), ErrorKind::Config);

        let wrong_shape =
            EventRegistry::load(MemoryChannelSource::new(r#"{"A": {"endpoint": "x"}}"#))
                .unwrap_err();
        assert_eq!(wrong_shape.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_resolve_unknown_type() {
        let registry = EventRegistry::load(MemoryChannelSource::new(ORDER_CHANNELS)).unwrap();

        let err = registry.resolve_channel("UnknownType").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChannelNotFound);
    }

    #[test]
    fn test_reload_replaces_table() {
        let source = Arc::new(MemoryChannelSource::new(ORDER_CHANNELS));
        let registry = EventRegistry::load(source.clone()).unwrap();

        source.set(
            r#"{"InvoiceEvent": {"endpoint": "invoice-topic", "schema": "invoice", "type": "kafka"}}"#,
        );
        assert_eq!(registry.reload().unwrap(), 2);

        assert!(registry.resolve_channel("OrderStatusEvent").is_err());
        let (endpoint, _) = registry.resolve_channel("InvoiceEvent").unwrap();
        assert_eq!(endpoint, "invoice-topic");
    }

    #[test]
    fn test_failed_reload_keeps_previous_table() {
        let source = Arc::new(MemoryChannelSource::new(ORDER_CHANNELS));
        let registry = EventRegistry::load(source.clone()).unwrap();

        source.set("[broken");
        let err = registry.reload().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(registry.version(), 1);
        assert!(registry.resolve_channel("OrderStatusEvent").is_ok());
    }

    #[test]
    fn test_reload_from_rewritten_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, ORDER_CHANNELS).unwrap();
        let registry = EventRegistry::from_file(&path).unwrap();

        std::fs::write(&path, generation("v2", 3)).unwrap();
        registry.reload().unwrap();

        assert_eq!(registry.snapshot().len(), 3);
        assert!(registry.resolve_channel("OrderStatusEvent").is_err());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let registry = EventRegistry::load(MemoryChannelSource::new(ORDER_CHANNELS)).unwrap();

        let mut copy = registry.snapshot();
        copy.clear();
        copy.insert(
            "Injected".to_string(),
            ChannelInfo::new("evil", "evil", "kafka"),
        );

        assert!(registry.resolve_channel("Injected").is_err());
        assert_eq!(
            registry.resolve_channel("OrderStatusEvent").unwrap().0,
            "order-topic"
        );
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_channels_of_kind() {
        let registry = EventRegistry::load(MemoryChannelSource::new(
            r#"{
                "A": {"endpoint": "shared", "schema": "a", "type": "kafka"},
                "B": {"endpoint": "shared", "schema": "b", "type": "kafka"},
                "C": {"endpoint": "c-queue", "schema": "c", "type": "rabbitmq"},
                "D": {"endpoint": "d-topic", "schema": "d", "type": "kafka"}
            }"#,
        ))
        .unwrap();

        assert_eq!(registry.channels_of_kind("kafka"), vec!["d-topic", "shared"]);
        assert_eq!(registry.channels_of_kind("rabbitmq"), vec!["c-queue"]);
        assert!(registry.channels_of_kind("nats").is_empty());
    }

    #[test]
    fn test_reload_is_atomic_for_concurrent_readers() {
        let size = 64;
        let gen_a = generation("a", size);
        let gen_b = generation("b", size);

        let source = Arc::new(MemoryChannelSource::new(gen_a.clone()));
        let registry = Arc::new(EventRegistry::load(source.clone()).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut reads = 0usize;
                    while !done.load(Ordering::Relaxed) {
                        let table = registry.current();
                        assert_eq!(table.len(), size);
                        let prefix = &table.get("Event0").unwrap().endpoint[..1];
                        for info in table.channels.values() {
                            assert!(
                                info.endpoint.starts_with(prefix),
                                "mixed generations in version {}",
                                table.version
                            );
                        }
                        let snapshot = registry.snapshot();
                        let prefix = &snapshot["Event0"].endpoint[..1];
                        assert!(snapshot.values().all(|c| c.endpoint.starts_with(prefix)));
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for i in 0..200 {
            source.set(if i % 2 == 0 { gen_b.clone() } else { gen_a.clone() });
            registry.reload().unwrap();
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.version(), 201);
    }
}
