// TicketStore - Persistent key-value storage using sled
//
// Provides typed access for storing:
// - The marketplace registry
// - Every event engine, keyed by address
// - The clock watermark and event nonce
// - The economy configuration

use crate::config::EconomyConfig;
use crate::event::EventEngine;
use crate::exchange::ExchangeState;
use crate::identity::Address;
use crate::market::MarketplaceRegistry;
use crate::Timestamp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Key prefixes for organizing data
mod keys {
    pub const REGISTRY: &[u8] = b"market:registry";
    pub const EVENT_PREFIX: &[u8] = b"event:";
    pub const WATERMARK: &[u8] = b"clock:watermark";
    pub const NONCE: &[u8] = b"exchange:nonce";
    pub const CONFIG: &[u8] = b"config:economy";
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    #[error("Store is incomplete: missing {0}")]
    Incomplete(&'static str),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of keys in the database
    pub key_count: usize,
    /// Number of stored events
    pub event_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(|e| StoreError::SerializationFailed(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

fn event_key(address: &Address) -> Vec<u8> {
    [keys::EVENT_PREFIX, hex::encode(address.as_bytes()).as_bytes()].concat()
}

/// Persistent store for the ticket economy
///
/// Uses sled for crash-safe, embedded storage.
/// A whole-state save is applied as one batch.
pub struct TicketStore {
    db: sled::Db,
}

impl TicketStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.db.is_empty())
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            event_count: self.db.scan_prefix(keys::EVENT_PREFIX).count(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    // ========================================================================
    // RAW KEY-VALUE OPERATIONS
    // ========================================================================

    fn put<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), StoreError> {
        self.db.insert(key, encode(value)?)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // REGISTRY PERSISTENCE
    // ========================================================================

    pub fn save_registry(&self, registry: &MarketplaceRegistry) -> Result<(), StoreError> {
        self.put(keys::REGISTRY, registry)
    }

    pub fn load_registry(&self) -> Result<Option<MarketplaceRegistry>, StoreError> {
        self.get(keys::REGISTRY)
    }

    // ========================================================================
    // EVENT PERSISTENCE
    // ========================================================================

    pub fn save_event(&self, engine: &EventEngine) -> Result<(), StoreError> {
        self.put(&event_key(engine.address()), engine)
    }

    pub fn load_event(&self, address: &Address) -> Result<Option<EventEngine>, StoreError> {
        self.get(&event_key(address))
    }

    /// Every stored event, keyed by address
    pub fn load_events(&self) -> Result<BTreeMap<Address, EventEngine>, StoreError> {
        let mut events = BTreeMap::new();
        for result in self.db.scan_prefix(keys::EVENT_PREFIX) {
            let (_, bytes) = result?;
            let engine: EventEngine = decode(&bytes)?;
            events.insert(*engine.address(), engine);
        }
        Ok(events)
    }

    // ========================================================================
    // CLOCK AND CONFIGURATION
    // ========================================================================

    pub fn save_watermark(&self, watermark: Timestamp) -> Result<(), StoreError> {
        self.put(keys::WATERMARK, &watermark)
    }

    pub fn load_watermark(&self) -> Result<Option<Timestamp>, StoreError> {
        self.get(keys::WATERMARK)
    }

    pub fn save_config(&self, config: &EconomyConfig) -> Result<(), StoreError> {
        self.put(keys::CONFIG, config)
    }

    pub fn load_config(&self) -> Result<Option<EconomyConfig>, StoreError> {
        self.get(keys::CONFIG)
    }

    // ========================================================================
    // WHOLE-STATE SNAPSHOTS
    // ========================================================================

    /// Write the complete exchange state in one atomic batch
    pub fn save_state(&self, state: &ExchangeState) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        batch.insert(keys::CONFIG, encode(&state.config)?);
        batch.insert(keys::REGISTRY, encode(&state.registry)?);
        batch.insert(keys::WATERMARK, encode(&state.watermark)?);
        batch.insert(keys::NONCE, encode(&state.nonce)?);
        for engine in state.events.values() {
            batch.insert(event_key(engine.address()), encode(engine)?);
        }
        self.db.apply_batch(batch)?;

        debug!(events = state.events.len(), watermark = state.watermark, "exchange state saved");
        Ok(())
    }

    /// Read the complete exchange state, if one was ever saved
    pub fn load_state(&self) -> Result<Option<ExchangeState>, StoreError> {
        let Some(registry) = self.load_registry()? else {
            return Ok(None);
        };
        let config = self.load_config()?.ok_or(StoreError::Incomplete("economy config"))?;

        Ok(Some(ExchangeState {
            config,
            registry,
            events: self.load_events()?,
            watermark: self.load_watermark()?.unwrap_or(0),
            nonce: self.get(keys::NONCE)?.unwrap_or(0),
        }))
    }
}
