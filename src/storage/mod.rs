// Storage module - PERSISTENCE
// Snapshots the registry, events and clock watermark into sled

mod store;

pub use store::{StorageStats, StoreError, TicketStore};
