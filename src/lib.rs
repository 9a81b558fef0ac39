// tixmesh - phase-gated event ticket economy
//
// A fungible ticket ledger per event, an event engine that gates sale,
// redemption, voting and settlement by time, and a marketplace registry
// that lists official and price-capped resale inventory.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod exchange;
pub mod identity;
pub mod journal;
pub mod ledger;
pub mod market;
pub mod storage;

/// Ticket class within one event's ledger
pub type ClassId = u32;

/// Ticket count
pub type Quantity = u64;

/// Currency amount in the smallest unit
pub type Amount = u128;

/// Unix seconds
pub type Timestamp = u64;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EconomyConfig;
pub use error::TicketError;
pub use event::{EventEngine, Phase, Receipt, Schedule};
pub use exchange::{ExchangeError, NewEvent, SharedExchange, TicketExchange};
pub use identity::Address;
pub use ledger::TicketLedger;
pub use market::{ListingId, MarketplaceRegistry, Purchase, ResaleOffer};
pub use storage::TicketStore;
