// Marketplace registry - listing directory and organiser allowlist
//
// The registry never touches balances or escrow. Every purchase, vote,
// claim and redemption is forwarded to the addressed event engine, which
// makes the decision; the registry only keeps its own listing bookkeeping.

use crate::error::{reasons, TicketError};
use crate::event::{EventEngine, Receipt, ResaleOrder};
use crate::identity::Address;
use crate::journal::{Journal, TicketEvent};
use crate::market::listing::{Listing, ListingId, ListingKind};
use crate::{Amount, ClassId, Quantity, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Resolves event addresses to engines
pub trait EventDirectory {
    fn event(&self, address: &Address) -> Option<&EventEngine>;
    fn event_mut(&mut self, address: &Address) -> Option<&mut EventEngine>;
}

impl EventDirectory for BTreeMap<Address, EventEngine> {
    fn event(&self, address: &Address) -> Option<&EventEngine> {
        self.get(address)
    }

    fn event_mut(&mut self, address: &Address) -> Option<&mut EventEngine> {
        self.get_mut(address)
    }
}

/// A holder's offer to resell tickets through the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResaleOffer {
    pub event: Address,
    pub price_per_unit: Amount,
    pub class_id: ClassId,
    pub quantity: Quantity,
}

/// A request to buy from a listing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Purchase {
    pub event: Address,
    pub listing_id: ListingId,
    pub quantity: Quantity,
    pub payment: Amount,
}

/// The marketplace: who may list, and what is listed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketplaceRegistry {
    address: Address,
    owner: Address,
    approved_organisers: BTreeSet<Address>,
    official: Vec<Listing>,
    resale: Vec<Listing>,
    journal: Journal,
}

impl MarketplaceRegistry {
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            approved_organisers: BTreeSet::new(),
            official: Vec::new(),
            resale: Vec::new(),
            journal: Journal::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    // ========================================================================
    // ORGANISER ALLOWLIST
    // ========================================================================

    pub fn approve_organiser(&mut self, caller: &Address, organiser: &Address) -> Result<(), TicketError> {
        if *caller != self.owner {
            return Err(TicketError::AccessDenied(reasons::NOT_MARKETPLACE_OWNER));
        }
        self.approved_organisers.insert(*organiser);
        info!(organiser = %organiser.short(), "organiser approved");
        Ok(())
    }

    /// Stop an organiser creating further official listings. Existing
    /// listings stay purchasable.
    pub fn revoke_organiser(&mut self, caller: &Address, organiser: &Address) -> Result<(), TicketError> {
        if *caller != self.owner {
            return Err(TicketError::AccessDenied(reasons::NOT_MARKETPLACE_OWNER));
        }
        self.approved_organisers.remove(organiser);
        info!(organiser = %organiser.short(), "organiser revoked");
        Ok(())
    }

    pub fn is_organiser_approved(&self, organiser: &Address) -> bool {
        self.approved_organisers.contains(organiser)
    }

    // ========================================================================
    // LISTING QUERIES
    // ========================================================================

    pub fn official_listing(&self, id: ListingId) -> Option<&Listing> {
        id.index().and_then(|i| self.official.get(i))
    }

    pub fn resale_listing(&self, id: ListingId) -> Option<&Listing> {
        id.index().and_then(|i| self.resale.get(i))
    }

    pub fn official_listing_count(&self) -> usize {
        self.official.len()
    }

    pub fn resale_listing_count(&self) -> usize {
        self.resale.len()
    }

    pub fn official_listings(&self) -> &[Listing] {
        &self.official
    }

    pub fn resale_listings(&self) -> &[Listing] {
        &self.resale
    }

    /// Listings of either kind for one event that still have tickets
    pub fn active_listings_for<'a>(&'a self, event: &'a Address) -> impl Iterator<Item = &'a Listing> + 'a {
        self.official
            .iter()
            .chain(self.resale.iter())
            .filter(move |l| l.event_address() == event && l.is_active())
    }

    // ========================================================================
    // LISTING CREATION
    // ========================================================================

    /// List the organiser's whole unsold inventory of a class at list price
    pub fn create_official_listing<D: EventDirectory>(
        &mut self,
        events: &D,
        caller: &Address,
        event_address: &Address,
        class_id: ClassId,
        now: Timestamp,
    ) -> Result<ListingId, TicketError> {
        if !self.is_organiser_approved(caller) {
            return Err(TicketError::AccessDenied(reasons::ORGANISER_NOT_APPROVED));
        }
        let engine = events
            .event(event_address)
            .ok_or(TicketError::UnknownEvent(*event_address))?;
        if engine.organiser() != caller {
            return Err(TicketError::AccessDenied(reasons::NOT_EVENT_ORGANISER));
        }

        let price = engine.ledger().price(class_id)?;
        let quantity = engine.unused_tickets(caller, class_id);
        if quantity == 0 {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_OWNED,
                available: 0,
                required: 1,
            });
        }

        let id = ListingId::new(self.official.len() as u64 + 1);
        let event_name = engine.name().to_string();
        self.official.push(Listing::new(
            id,
            ListingKind::Official,
            *caller,
            *event_address,
            event_name.clone(),
            class_id,
            quantity,
            price,
            now,
        ));

        self.journal.emit(
            self.address,
            now,
            TicketEvent::OfficialTicketListed {
                seller: *caller,
                event_name,
                listing_id: id.get(),
                quantity,
            },
        );
        info!(listing = %id, event = %event_address.short(), class_id, quantity, price, "official listing created");

        Ok(id)
    }

    /// List a holder's tickets for resale, capped at list price
    pub fn create_resale_listing<D: EventDirectory>(
        &mut self,
        events: &D,
        caller: &Address,
        offer: &ResaleOffer,
        now: Timestamp,
    ) -> Result<ListingId, TicketError> {
        if offer.quantity == 0 {
            return Err(TicketError::ZeroQuantity);
        }
        let engine = events
            .event(&offer.event)
            .ok_or(TicketError::UnknownEvent(offer.event))?;
        if caller == engine.organiser() {
            return Err(TicketError::AccessDenied(reasons::ORGANISER_SELLS_OFFICIALLY));
        }

        let available = engine.unused_tickets(caller, offer.class_id);
        if available < offer.quantity {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_OWNED,
                available,
                required: offer.quantity,
            });
        }
        if !engine.ledger().is_approved_for_all(caller, engine.address()) {
            return Err(TicketError::UnapprovedTransfer(reasons::APPROVE_ENGINE_FIRST));
        }
        let cap = engine.ledger().price(offer.class_id)?;
        if offer.price_per_unit > cap {
            return Err(TicketError::PriceCapExceeded {
                asked: offer.price_per_unit,
                cap,
            });
        }

        let id = ListingId::new(self.resale.len() as u64 + 1);
        let event_name = engine.name().to_string();
        self.resale.push(Listing::new(
            id,
            ListingKind::Resale,
            *caller,
            offer.event,
            event_name.clone(),
            offer.class_id,
            offer.quantity,
            offer.price_per_unit,
            now,
        ));

        self.journal.emit(
            self.address,
            now,
            TicketEvent::ResaleTicketListed {
                seller: *caller,
                event_name,
                listing_id: id.get(),
                quantity: offer.quantity,
            },
        );
        info!(
            listing = %id,
            seller = %caller.short(),
            event = %offer.event.short(),
            quantity = offer.quantity,
            price = offer.price_per_unit,
            "resale listing created"
        );

        Ok(id)
    }

    // ========================================================================
    // PURCHASES
    // ========================================================================

    fn resolve(&self, kind: ListingKind, purchase: &Purchase) -> Result<usize, TicketError> {
        let listings = match kind {
            ListingKind::Official => &self.official,
            ListingKind::Resale => &self.resale,
        };
        let unknown = TicketError::UnknownListing(purchase.listing_id.get());

        let index = purchase.listing_id.index().ok_or(unknown.clone())?;
        let listing = listings.get(index).ok_or(unknown.clone())?;
        if *listing.event_address() != purchase.event {
            return Err(unknown);
        }

        if purchase.quantity == 0 {
            return Err(TicketError::ZeroQuantity);
        }
        if listing.remaining() < purchase.quantity {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_LISTED,
                available: listing.remaining(),
                required: purchase.quantity,
            });
        }
        Ok(index)
    }

    /// Buy from an official listing; the engine settles the sale
    pub fn buy_official_ticket<D: EventDirectory>(
        &mut self,
        events: &mut D,
        caller: &Address,
        purchase: &Purchase,
        now: Timestamp,
    ) -> Result<Receipt, TicketError> {
        let index = self.resolve(ListingKind::Official, purchase)?;
        let class_id = self.official[index].class_id();

        let engine = events
            .event_mut(&purchase.event)
            .ok_or(TicketError::UnknownEvent(purchase.event))?;
        let receipt =
            engine.process_official_sale(&self.address, caller, class_id, purchase.quantity, purchase.payment, now)?;

        let listing = &mut self.official[index];
        listing.take(purchase.quantity);
        let event_name = listing.event_name().to_string();
        self.journal.emit(
            self.address,
            now,
            TicketEvent::OfficialListingPurchased {
                buyer: *caller,
                event_name,
                listing_id: purchase.listing_id.get(),
                quantity: purchase.quantity,
            },
        );

        Ok(receipt)
    }

    /// Buy from a resale listing at its asking price
    pub fn buy_resale_ticket<D: EventDirectory>(
        &mut self,
        events: &mut D,
        caller: &Address,
        purchase: &Purchase,
        now: Timestamp,
    ) -> Result<Receipt, TicketError> {
        let index = self.resolve(ListingKind::Resale, purchase)?;
        let listing = &self.resale[index];
        let order = ResaleOrder {
            seller: *listing.seller(),
            buyer: *caller,
            class_id: listing.class_id(),
            quantity: purchase.quantity,
            ask_price: listing.price_per_unit(),
        };

        let engine = events
            .event_mut(&purchase.event)
            .ok_or(TicketError::UnknownEvent(purchase.event))?;
        let receipt = engine.process_resale(&self.address, &order, purchase.payment, now)?;

        let listing = &mut self.resale[index];
        listing.take(purchase.quantity);
        let event_name = listing.event_name().to_string();
        self.journal.emit(
            self.address,
            now,
            TicketEvent::ResaleListingPurchased {
                buyer: *caller,
                event_name,
                listing_id: purchase.listing_id.get(),
                quantity: purchase.quantity,
            },
        );

        Ok(receipt)
    }

    // ========================================================================
    // FORWARDED HOLDER ACTIONS
    // ========================================================================

    pub fn vote_for_refund<D: EventDirectory>(
        &mut self,
        events: &mut D,
        caller: &Address,
        event_address: &Address,
        now: Timestamp,
    ) -> Result<Receipt, TicketError> {
        let engine = events
            .event_mut(event_address)
            .ok_or(TicketError::UnknownEvent(*event_address))?;
        engine.vote(&self.address, caller, now)
    }

    /// Claim a refund. The threshold is checked here and again by the engine.
    pub fn claim_refund<D: EventDirectory>(
        &mut self,
        events: &mut D,
        caller: &Address,
        event_address: &Address,
        now: Timestamp,
    ) -> Result<Receipt, TicketError> {
        let engine = events
            .event_mut(event_address)
            .ok_or(TicketError::UnknownEvent(*event_address))?;
        if !engine.refund_threshold_met() {
            return Err(TicketError::ThresholdNotMet(reasons::THRESHOLD_NOT_MET));
        }
        engine.handle_refund(&self.address, caller, now)
    }

    /// Redeem tickets at the door
    pub fn use_ticket<D: EventDirectory>(
        &mut self,
        events: &mut D,
        caller: &Address,
        event_address: &Address,
        class_id: ClassId,
        quantity: Quantity,
        now: Timestamp,
    ) -> Result<Receipt, TicketError> {
        let engine = events
            .event_mut(event_address)
            .ok_or(TicketError::UnknownEvent(*event_address))?;
        engine.process_ticket_usage(&self.address, caller, class_id, quantity, now)
    }
}
