// Event module - THE LIFECYCLE
// Phase schedule, refund quorum and the per-event engine

mod engine;
mod invariants;
mod phase;
mod quorum;

pub use engine::{EventEngine, EventSetup, Receipt, ResaleOrder};
pub use invariants::{check_invariants, InvariantError};
pub use phase::{Phase, Schedule};
pub use quorum::RefundQuorum;
