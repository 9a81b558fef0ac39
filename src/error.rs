// Error taxonomy shared by the ledger, the event engine and the registry

use crate::identity::Address;
use thiserror::Error;

/// Why an operation was refused.
///
/// Every variant is reported before any state is touched, so a caller that
/// receives one of these can correct the precondition and resubmit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("Access denied: {0}")]
    AccessDenied(&'static str),

    #[error("Phase violation: {0}")]
    PhaseViolation(&'static str),

    #[error("Insufficient funds: {reason} (sent {sent}, required {required})")]
    InsufficientFunds {
        reason: &'static str,
        sent: u128,
        required: u128,
    },

    #[error("Insufficient inventory: {reason} (available {available}, required {required})")]
    InsufficientInventory {
        reason: &'static str,
        available: u64,
        required: u64,
    },

    #[error("Price cap exceeded: asked {asked}, cap {cap}")]
    PriceCapExceeded { asked: u128, cap: u128 },

    #[error("Already voted: {0}")]
    AlreadyVoted(&'static str),

    #[error("Refund threshold not met: {0}")]
    ThresholdNotMet(&'static str),

    #[error("Refund threshold met: {0}")]
    ThresholdMet(&'static str),

    #[error("Unapproved transfer: {0}")]
    UnapprovedTransfer(&'static str),

    #[error("Unknown event {0}")]
    UnknownEvent(Address),

    #[error("Unknown listing #{0}")]
    UnknownListing(u64),

    #[error("Ticket class {0} has no price")]
    UnknownClass(u32),

    #[error("Ticket class {0} is already priced")]
    PriceAlreadySet(u32),

    #[error("Quantity must be greater than zero")]
    ZeroQuantity,

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(&'static str),

    #[error("Arithmetic overflow")]
    Overflow,
}

impl TicketError {
    /// Stable, machine-readable name of the error class
    pub fn code(&self) -> &'static str {
        match self {
            TicketError::AccessDenied(_) => "AccessDenied",
            TicketError::PhaseViolation(_) => "PhaseViolation",
            TicketError::InsufficientFunds { .. } => "InsufficientFunds",
            TicketError::InsufficientInventory { .. } => "InsufficientInventory",
            TicketError::PriceCapExceeded { .. } => "PriceCapExceeded",
            TicketError::AlreadyVoted(_) => "AlreadyVoted",
            TicketError::ThresholdNotMet(_) => "ThresholdNotMet",
            TicketError::ThresholdMet(_) => "ThresholdMet",
            TicketError::UnapprovedTransfer(_) => "UnapprovedTransfer",
            TicketError::UnknownEvent(_) => "UnknownEvent",
            TicketError::UnknownListing(_) => "UnknownListing",
            TicketError::UnknownClass(_) => "UnknownClass",
            TicketError::PriceAlreadySet(_) => "PriceAlreadySet",
            TicketError::ZeroQuantity => "ZeroQuantity",
            TicketError::InvalidSchedule(_) => "InvalidSchedule",
            TicketError::Overflow => "Overflow",
        }
    }
}

/// Reason strings surfaced to callers
pub mod reasons {
    pub const PHASE_UNAVAILABLE: &str = "requested service is not available now";
    pub const NOT_APPROVED_PLATFORM: &str = "Only approved platforms can call this function";
    pub const NOT_ENOUGH_FUNDS: &str = "Not enough ETH sent!";
    pub const NOT_ENOUGH_TO_SELL: &str = "Not enough tickets to sell";
    pub const NOT_ENOUGH_TO_USE: &str = "Not enough tickets to use";
    pub const NOT_ENOUGH_OWNED: &str = "Insufficient tickets owned!";
    pub const NOT_ENOUGH_LISTED: &str = "Not enough tickets left in listing";
    pub const NOT_ENOUGH_BALANCE: &str = "Insufficient ticket balance";
    pub const NOT_ENOUGH_ESCROW: &str = "Escrow cannot cover the payout";
    pub const MUST_HOLD_TO_VOTE: &str = "You must have tickets to vote";
    pub const ALREADY_VOTED: &str = "You have already voted";
    pub const NO_TICKETS_HELD: &str = "Address does not hold any tickets";
    pub const ORGANISER_NOT_REFUNDABLE: &str = "Organiser inventory is not refundable";
    pub const THRESHOLD_NOT_MET: &str = "Refund threshold not met";
    pub const THRESHOLD_MET: &str = "No scam! Refund threshold is met!";
    pub const NOT_OPERATOR: &str = "Caller is neither the owner nor an approved operator";
    pub const APPROVE_ENGINE_FIRST: &str =
        "Please approve the Event contract to transfer your tokens first!";
    pub const NOT_LEDGER_OWNER: &str = "Only the ticket issuer can do this";
    pub const NOT_MARKETPLACE_OWNER: &str = "Only the marketplace owner can do this";
    pub const ORGANISER_NOT_APPROVED: &str = "Organiser is not approved";
    pub const NOT_EVENT_ORGANISER: &str = "Only the event organiser can list official tickets";
    pub const NOT_PRINCIPAL: &str = "Caller may not act for this account";
    pub const ORGANISER_SELLS_OFFICIALLY: &str = "Organiser inventory leaves only through official sales";
    pub const ALREADY_WITHDRAWN: &str = "Funds have already been withdrawn";
}
