// Listings - official and resale offers in the registry

use crate::identity::Address;
use crate::{Amount, ClassId, Quantity, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential listing number, starting at 1 per kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListingId(u64);

impl ListingId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// Position in the registry's backing vector
    pub(crate) fn index(&self) -> Option<usize> {
        self.0.checked_sub(1).map(|i| i as usize)
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingKind {
    /// Organiser inventory at list price
    Official,
    /// Holder tickets at or below list price
    Resale,
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingKind::Official => f.write_str("official"),
            ListingKind::Resale => f.write_str("resale"),
        }
    }
}

/// An offer of tickets. Never removed; inert once `remaining` reaches zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    id: ListingId,
    kind: ListingKind,
    seller: Address,
    event_address: Address,
    event_name: String,
    class_id: ClassId,
    remaining: Quantity,
    price_per_unit: Amount,
    listed_at: Timestamp,
}

impl Listing {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ListingId,
        kind: ListingKind,
        seller: Address,
        event_address: Address,
        event_name: String,
        class_id: ClassId,
        remaining: Quantity,
        price_per_unit: Amount,
        listed_at: Timestamp,
    ) -> Self {
        Self {
            id,
            kind,
            seller,
            event_address,
            event_name,
            class_id,
            remaining,
            price_per_unit,
            listed_at,
        }
    }

    pub fn id(&self) -> ListingId {
        self.id
    }

    pub fn kind(&self) -> ListingKind {
        self.kind
    }

    pub fn is_resale(&self) -> bool {
        self.kind == ListingKind::Resale
    }

    pub fn seller(&self) -> &Address {
        &self.seller
    }

    pub fn event_address(&self) -> &Address {
        &self.event_address
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn remaining(&self) -> Quantity {
        self.remaining
    }

    pub fn price_per_unit(&self) -> Amount {
        self.price_per_unit
    }

    pub fn listed_at(&self) -> Timestamp {
        self.listed_at
    }

    /// Still has tickets to sell
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    pub(crate) fn take(&mut self, quantity: Quantity) {
        self.remaining -= quantity;
    }
}
