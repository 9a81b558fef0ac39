// Exchange module - THE WIRING
// Bootstraps events, owns the registry and event book, and injects time

mod facade;
mod setup;
mod shared;

pub use facade::{ExchangeError, ExchangeState, TicketExchange};
pub use setup::{ClassIssue, NewEvent};
pub use shared::SharedExchange;
