// Ledger module - WHAT IS HELD
// Ticket balances per class and the per-event escrow of sale proceeds

mod escrow;
mod ticket;

pub use escrow::{Escrow, EscrowDirection, EscrowRecord, Payout, PayoutKind};
pub use ticket::{TicketClass, TicketLedger};
