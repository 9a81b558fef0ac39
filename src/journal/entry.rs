// Journal entries - every state change the economy emits

use crate::identity::Address;
use crate::{Amount, ClassId, Quantity, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something observable that an operation did
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    OfficialTicketPurchased {
        buyer: Address,
        quantity: Quantity,
        class_id: ClassId,
    },
    ResaleTicketPurchased {
        seller: Address,
        buyer: Address,
        quantity: Quantity,
        class_id: ClassId,
        total_price_paid: Amount,
    },
    TicketUsed {
        holder: Address,
        quantity: Quantity,
        class_id: ClassId,
    },
    Voted {
        voter: Address,
        refund_votes: Quantity,
    },
    RefundsIssued {
        holder: Address,
        quantity: Quantity,
        refund_amount: Amount,
    },
    FundsWithdrawn,
    OfficialTicketListed {
        seller: Address,
        event_name: String,
        listing_id: u64,
        quantity: Quantity,
    },
    ResaleTicketListed {
        seller: Address,
        event_name: String,
        listing_id: u64,
        quantity: Quantity,
    },
    /// Registry-side record of a purchase through an official listing
    OfficialListingPurchased {
        buyer: Address,
        event_name: String,
        listing_id: u64,
        quantity: Quantity,
    },
    /// Registry-side record of a purchase through a resale listing
    ResaleListingPurchased {
        buyer: Address,
        event_name: String,
        listing_id: u64,
        quantity: Quantity,
    },
}

impl TicketEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TicketEvent::OfficialTicketPurchased { .. } => "OfficialTicketPurchased",
            TicketEvent::ResaleTicketPurchased { .. } => "ResaleTicketPurchased",
            TicketEvent::TicketUsed { .. } => "TicketUsed",
            TicketEvent::Voted { .. } => "Voted",
            TicketEvent::RefundsIssued { .. } => "RefundsIssued",
            TicketEvent::FundsWithdrawn => "FundsWithdrawn",
            TicketEvent::OfficialTicketListed { .. } => "OfficialTicketListed",
            TicketEvent::ResaleTicketListed { .. } => "ResaleTicketListed",
            TicketEvent::OfficialListingPurchased { .. } => "OfficialListingPurchased",
            TicketEvent::ResaleListingPurchased { .. } => "ResaleListingPurchased",
        }
    }
}

impl fmt::Display for TicketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketEvent::OfficialTicketPurchased { buyer, quantity, class_id } => {
                write!(f, "{}({}, {}, {})", self.name(), buyer, quantity, class_id)
            }
            TicketEvent::ResaleTicketPurchased {
                seller,
                buyer,
                quantity,
                class_id,
                total_price_paid,
            } => write!(
                f,
                "{}({}, {}, {}, {}, {})",
                self.name(),
                seller,
                buyer,
                quantity,
                class_id,
                total_price_paid
            ),
            TicketEvent::TicketUsed { holder, quantity, class_id } => {
                write!(f, "{}({}, {}, {})", self.name(), holder, quantity, class_id)
            }
            TicketEvent::Voted { voter, refund_votes } => {
                write!(f, "{}({}, {})", self.name(), voter, refund_votes)
            }
            TicketEvent::RefundsIssued {
                holder,
                quantity,
                refund_amount,
            } => write!(f, "{}({}, {}, {})", self.name(), holder, quantity, refund_amount),
            TicketEvent::FundsWithdrawn => write!(f, "{}", self.name()),
            TicketEvent::OfficialTicketListed {
                seller,
                event_name,
                listing_id,
                quantity,
            }
            | TicketEvent::ResaleTicketListed {
                seller,
                event_name,
                listing_id,
                quantity,
            } => write!(f, "{}({}, {:?}, {}, {})", self.name(), seller, event_name, listing_id, quantity),
            TicketEvent::OfficialListingPurchased {
                buyer,
                event_name,
                listing_id,
                quantity,
            }
            | TicketEvent::ResaleListingPurchased {
                buyer,
                event_name,
                listing_id,
                quantity,
            } => write!(f, "{}({}, {:?}, {}, {})", self.name(), buyer, event_name, listing_id, quantity),
        }
    }
}

/// A journal line: who emitted what, and when
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    seq: u64,
    emitter: Address,
    at: Timestamp,
    event: TicketEvent,
}

impl LogEntry {
    /// Position in the emitter's journal, starting at 0
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn emitter(&self) -> &Address {
        &self.emitter
    }

    pub fn at(&self) -> Timestamp {
        self.at
    }

    pub fn event(&self) -> &TicketEvent {
        &self.event
    }
}

/// Append-only log owned by an engine or a registry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    entries: Vec<LogEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return a copy of it
    pub fn emit(&mut self, emitter: Address, at: Timestamp, event: TicketEvent) -> LogEntry {
        let entry = LogEntry {
            seq: self.entries.len() as u64,
            emitter,
            at,
            event,
        };
        self.entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries at or after `seq`
    pub fn since(&self, seq: u64) -> &[LogEntry] {
        let start = (seq as usize).min(self.entries.len());
        &self.entries[start..]
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
