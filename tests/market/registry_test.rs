// Registry Tests
// Listing, buying, voting and claiming through the marketplace

use std::collections::BTreeMap;
use tixmesh::error::{reasons, TicketError};
use tixmesh::event::{EventEngine, EventSetup, RefundQuorum, Schedule};
use tixmesh::identity::Address;
use tixmesh::journal::TicketEvent;
use tixmesh::ledger::TicketLedger;
use tixmesh::market::{ListingId, ListingKind, MarketplaceRegistry, Purchase, ResaleOffer};
use tixmesh::Timestamp;

const SALE: Timestamp = 1_000;
const EVENT: Timestamp = 2_000;
const VOTE: Timestamp = 3_000;
const END: Timestamp = 4_000;

struct Market {
    registry: MarketplaceRegistry,
    events: BTreeMap<Address, EventEngine>,
    event: Address,
    owner: Address,
    organiser: Address,
}

fn user(n: u8) -> Address {
    Address::from_label(&format!("user{}", n))
}

fn market() -> Market {
    let owner = Address::from_label("marketplace");
    let organiser = Address::from_label("organiser");
    let registry = MarketplaceRegistry::new(Address::from_label("registry"), owner);

    let mut ledger = TicketLedger::new(Address::generate(), organiser, "test-uri", [(0, 10_000)]).unwrap();
    ledger.set_price(&organiser, 0, 10).unwrap();
    let event = Address::derive("event", &organiser, "Test Event", 0);
    let setup = EventSetup {
        address: event,
        organiser,
        name: "Test Event".to_string(),
        schedule: Schedule::new(SALE, EVENT, VOTE, END).unwrap(),
        marketplace: *registry.address(),
        quorum: RefundQuorum::default(),
    };

    let mut events = BTreeMap::new();
    events.insert(event, EventEngine::new(setup, ledger).unwrap());

    Market {
        registry,
        events,
        event,
        owner,
        organiser,
    }
}

impl Market {
    fn engine(&self) -> &EventEngine {
        &self.events[&self.event]
    }

    fn approve_engine(&mut self, holder: &Address) {
        let event = self.event;
        self.events
            .get_mut(&event)
            .unwrap()
            .set_approval_for_all(holder, &event, true);
    }

    fn list_official(&mut self) -> ListingId {
        let (owner, organiser) = (self.owner, self.organiser);
        self.registry.approve_organiser(&owner, &organiser).unwrap();
        self.registry
            .create_official_listing(&self.events, &organiser, &self.event, 0, SALE)
            .unwrap()
    }

    fn purchase(&self, listing: ListingId, quantity: u64, payment: u128) -> Purchase {
        Purchase {
            event: self.event,
            listing_id: listing,
            quantity,
            payment,
        }
    }

    fn buy_official(&mut self, buyer: &Address, quantity: u64) {
        let purchase = self.purchase(ListingId::new(1), quantity, 10 * quantity as u128);
        self.registry
            .buy_official_ticket(&mut self.events, buyer, &purchase, SALE)
            .unwrap();
    }

    /// Ten tickets sold: user1..user4 buy 1, 2, 3, 4
    fn sold_out_to_users(&mut self) {
        self.list_official();
        for n in 1..=4 {
            self.buy_official(&user(n), n as u64);
        }
    }
}

// ============================================================================
// ORGANISER LISTINGS
// ============================================================================

#[test]
fn test_unapproved_organiser_cannot_list() {
    let mut m = market();
    let organiser = m.organiser;

    let result = m.registry.create_official_listing(&m.events, &organiser, &m.event, 0, SALE);

    assert_eq!(result, Err(TicketError::AccessDenied(reasons::ORGANISER_NOT_APPROVED)));
    assert_eq!(m.registry.official_listing_count(), 0);
}

#[test]
fn test_official_listing_snapshots_inventory() {
    let mut m = market();

    let id = m.list_official();
    let listing = m.registry.official_listing(id).unwrap();

    assert_eq!(id, ListingId::new(1));
    assert_eq!(listing.kind(), ListingKind::Official);
    assert_eq!(listing.remaining(), 10_000);
    assert_eq!(listing.price_per_unit(), 10);
    assert_eq!(listing.seller(), &m.organiser);
    assert_eq!(
        m.registry.journal().last().unwrap().event(),
        &TicketEvent::OfficialTicketListed {
            seller: m.organiser,
            event_name: "Test Event".to_string(),
            listing_id: 1,
            quantity: 10_000,
        }
    );
}

#[test]
fn test_approved_organiser_cannot_list_others_event() {
    let mut m = market();
    let other = Address::from_label("other-organiser");
    let owner = m.owner;
    m.registry.approve_organiser(&owner, &other).unwrap();

    let result = m.registry.create_official_listing(&m.events, &other, &m.event, 0, SALE);

    assert_eq!(result, Err(TicketError::AccessDenied(reasons::NOT_EVENT_ORGANISER)));
}

#[test]
fn test_unknown_event_rejected() {
    let mut m = market();
    let (owner, organiser) = (m.owner, m.organiser);
    m.registry.approve_organiser(&owner, &organiser).unwrap();
    let missing = Address::from_label("missing");

    let result = m.registry.create_official_listing(&m.events, &organiser, &missing, 0, SALE);

    assert_eq!(result, Err(TicketError::UnknownEvent(missing)));
}

// ============================================================================
// OFFICIAL PURCHASES
// ============================================================================

#[test]
fn test_users_buy_from_official_listing() {
    let mut m = market();

    m.sold_out_to_users();

    assert_eq!(m.engine().ledger().balance_of(&m.organiser, 0), 9_990);
    assert_eq!(m.engine().total_tickets_sold(), 10);
    assert_eq!(m.registry.official_listing(ListingId::new(1)).unwrap().remaining(), 9_990);
    assert_eq!(
        m.registry.journal().last().unwrap().event(),
        &TicketEvent::OfficialListingPurchased {
            buyer: user(4),
            event_name: "Test Event".to_string(),
            listing_id: 1,
            quantity: 4,
        }
    );
}

#[test]
fn test_failed_purchase_keeps_listing_intact() {
    let mut m = market();
    m.list_official();
    let purchase = m.purchase(ListingId::new(1), 2, 19);

    let result = m.registry.buy_official_ticket(&mut m.events, &user(1), &purchase, SALE);

    assert!(matches!(result, Err(TicketError::InsufficientFunds { .. })));
    assert_eq!(m.registry.official_listing(ListingId::new(1)).unwrap().remaining(), 10_000);
    assert_eq!(m.registry.journal().len(), 1);
}

#[test]
fn test_purchase_before_sale_refused() {
    let mut m = market();
    m.list_official();
    let purchase = m.purchase(ListingId::new(1), 1, 10);

    let result = m.registry.buy_official_ticket(&mut m.events, &user(1), &purchase, SALE - 1);

    assert_eq!(result, Err(TicketError::PhaseViolation(reasons::PHASE_UNAVAILABLE)));
}

#[test]
fn test_unknown_listing_refused() {
    let mut m = market();
    m.list_official();

    for id in [0, 2] {
        let purchase = m.purchase(ListingId::new(id), 1, 10);
        let result = m.registry.buy_official_ticket(&mut m.events, &user(1), &purchase, SALE);
        assert_eq!(result, Err(TicketError::UnknownListing(id)));
    }
}

#[test]
fn test_listing_for_other_event_refused() {
    let mut m = market();
    m.list_official();
    let mut purchase = m.purchase(ListingId::new(1), 1, 10);
    purchase.event = Address::from_label("elsewhere");

    let result = m.registry.buy_official_ticket(&mut m.events, &user(1), &purchase, SALE);

    assert_eq!(result, Err(TicketError::UnknownListing(1)));
}

// ============================================================================
// RESALE LISTINGS
// ============================================================================

#[test]
fn test_resale_listing_preconditions() {
    let mut m = market();
    m.sold_out_to_users();
    let event = m.event;
    let offer = move |quantity, price_per_unit| ResaleOffer {
        event,
        price_per_unit,
        class_id: 0,
        quantity,
    };

    let too_many = m.registry.create_resale_listing(&m.events, &user(4), &offer(5, 10), SALE);
    let unapproved = m.registry.create_resale_listing(&m.events, &user(4), &offer(2, 10), SALE);
    m.approve_engine(&user(4));
    let scalped = m.registry.create_resale_listing(&m.events, &user(4), &offer(2, 11), SALE);
    let listed = m.registry.create_resale_listing(&m.events, &user(4), &offer(2, 10), SALE);

    assert_eq!(
        too_many,
        Err(TicketError::InsufficientInventory {
            reason: reasons::NOT_ENOUGH_OWNED,
            available: 4,
            required: 5,
        })
    );
    assert_eq!(unapproved, Err(TicketError::UnapprovedTransfer(reasons::APPROVE_ENGINE_FIRST)));
    assert_eq!(scalped, Err(TicketError::PriceCapExceeded { asked: 11, cap: 10 }));
    assert_eq!(listed, Ok(ListingId::new(1)));
    assert_eq!(m.registry.resale_listing_count(), 1);
}

#[test]
fn test_organiser_cannot_list_inventory_for_resale() {
    let mut m = market();
    let organiser = m.organiser;
    m.approve_engine(&organiser);
    let offer = ResaleOffer {
        event: m.event,
        price_per_unit: 1,
        class_id: 0,
        quantity: 5,
    };

    let result = m.registry.create_resale_listing(&m.events, &organiser, &offer, SALE);

    assert_eq!(result, Err(TicketError::AccessDenied(reasons::ORGANISER_SELLS_OFFICIALLY)));
    assert_eq!(m.registry.resale_listing_count(), 0);
}

#[test]
fn test_buy_resale_listing() {
    let mut m = market();
    m.sold_out_to_users();
    m.approve_engine(&user(4));
    let offer = ResaleOffer {
        event: m.event,
        price_per_unit: 10,
        class_id: 0,
        quantity: 2,
    };
    let id = m.registry.create_resale_listing(&m.events, &user(4), &offer, SALE).unwrap();
    let purchase = m.purchase(id, 2, 20);

    let receipt = m
        .registry
        .buy_resale_ticket(&mut m.events, &user(1), &purchase, SALE)
        .unwrap();

    assert_eq!(m.engine().ledger().balance_of(&user(4), 0), 2);
    assert_eq!(m.engine().ledger().balance_of(&user(1), 0), 3);
    assert_eq!(receipt.paid_to(&user(4)), 20);
    assert!(!m.registry.resale_listing(id).unwrap().is_active());
    assert_eq!(
        m.registry.journal().last().unwrap().event(),
        &TicketEvent::ResaleListingPurchased {
            buyer: user(1),
            event_name: "Test Event".to_string(),
            listing_id: 1,
            quantity: 2,
        }
    );
}

#[test]
fn test_cannot_buy_more_than_listed() {
    let mut m = market();
    m.sold_out_to_users();
    m.approve_engine(&user(4));
    let offer = ResaleOffer {
        event: m.event,
        price_per_unit: 8,
        class_id: 0,
        quantity: 1,
    };
    let id = m.registry.create_resale_listing(&m.events, &user(4), &offer, SALE).unwrap();
    let purchase = m.purchase(id, 2, 16);

    let result = m.registry.buy_resale_ticket(&mut m.events, &user(1), &purchase, SALE);

    assert_eq!(
        result,
        Err(TicketError::InsufficientInventory {
            reason: reasons::NOT_ENOUGH_LISTED,
            available: 1,
            required: 2,
        })
    );
}

#[test]
fn test_stale_resale_listing_fails_at_engine() {
    let mut m = market();
    m.sold_out_to_users();
    m.approve_engine(&user(4));
    let offer = ResaleOffer {
        event: m.event,
        price_per_unit: 10,
        class_id: 0,
        quantity: 4,
    };
    let id = m.registry.create_resale_listing(&m.events, &user(4), &offer, SALE).unwrap();
    let event = m.event;
    m.events
        .get_mut(&event)
        .unwrap()
        .transfer(&user(4), &user(4), &user(3), 0, 4)
        .unwrap();
    let purchase = m.purchase(id, 1, 10);

    let result = m.registry.buy_resale_ticket(&mut m.events, &user(1), &purchase, SALE);

    assert!(matches!(
        result,
        Err(TicketError::InsufficientInventory { reason, .. }) if reason == reasons::NOT_ENOUGH_TO_SELL
    ));
    assert_eq!(m.registry.resale_listing(id).unwrap().remaining(), 4);
}

#[test]
fn test_active_listings_for_event() {
    let mut m = market();
    m.sold_out_to_users();
    m.approve_engine(&user(2));
    let offer = ResaleOffer {
        event: m.event,
        price_per_unit: 5,
        class_id: 0,
        quantity: 2,
    };
    let id = m.registry.create_resale_listing(&m.events, &user(2), &offer, SALE).unwrap();
    let purchase = m.purchase(id, 2, 10);
    m.registry
        .buy_resale_ticket(&mut m.events, &user(3), &purchase, SALE)
        .unwrap();

    let active: Vec<_> = m.registry.active_listings_for(&m.event).collect();

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].kind(), ListingKind::Official);
}

// ============================================================================
// VOTING, REDEMPTION AND SETTLEMENT
// ============================================================================

#[test]
fn test_vote_below_quorum_leaves_funds_to_organiser() {
    let mut m = market();
    m.sold_out_to_users();
    m.approve_engine(&user(4));
    let offer = ResaleOffer {
        event: m.event,
        price_per_unit: 10,
        class_id: 0,
        quantity: 2,
    };
    let id = m.registry.create_resale_listing(&m.events, &user(4), &offer, SALE).unwrap();
    let purchase = m.purchase(id, 2, 20);
    m.registry
        .buy_resale_ticket(&mut m.events, &user(1), &purchase, SALE)
        .unwrap();

    let event = m.event;
    let vote = m.registry.vote_for_refund(&mut m.events, &user(1), &event, VOTE).unwrap();
    assert_eq!(
        vote.event(),
        &TicketEvent::Voted {
            voter: user(1),
            refund_votes: 3,
        }
    );

    let claim = m.registry.claim_refund(&mut m.events, &user(1), &event, END);
    assert_eq!(claim, Err(TicketError::ThresholdNotMet(reasons::THRESHOLD_NOT_MET)));

    let organiser = m.organiser;
    let withdrawn = m
        .events
        .get_mut(&event)
        .unwrap()
        .handle_withdraw(&organiser, END)
        .unwrap();
    assert_eq!(withdrawn.paid_to(&organiser), 100);
}

#[test]
fn test_quorum_met_refunds_through_registry() {
    let mut m = market();
    m.sold_out_to_users();
    let event = m.event;

    m.registry.vote_for_refund(&mut m.events, &user(3), &event, VOTE).unwrap();
    m.registry.vote_for_refund(&mut m.events, &user(4), &event, VOTE).unwrap();
    let again = m.registry.vote_for_refund(&mut m.events, &user(4), &event, VOTE);
    let refund = m.registry.claim_refund(&mut m.events, &user(2), &event, END).unwrap();

    assert_eq!(again, Err(TicketError::AlreadyVoted(reasons::ALREADY_VOTED)));
    assert_eq!(m.engine().refund_votes(), 7);
    assert_eq!(refund.paid_to(&user(2)), 20);
    assert_eq!(m.engine().ledger().balance_of(&user(2), 0), 0);
}

#[test]
fn test_use_ticket_through_registry() {
    let mut m = market();
    m.sold_out_to_users();
    let event = m.event;

    m.registry.use_ticket(&mut m.events, &user(2), &event, 0, 2, EVENT).unwrap();
    let over = m.registry.use_ticket(&mut m.events, &user(2), &event, 0, 1, EVENT);

    assert_eq!(m.engine().tickets_used(&user(2), 0), 2);
    assert!(matches!(over, Err(TicketError::InsufficientInventory { .. })));
}

#[test]
fn test_revoked_organiser_cannot_list_again() {
    let mut m = market();
    m.list_official();
    let (owner, organiser) = (m.owner, m.organiser);
    m.registry.revoke_organiser(&owner, &organiser).unwrap();

    let result = m.registry.create_official_listing(&m.events, &organiser, &m.event, 0, SALE);

    assert_eq!(result, Err(TicketError::AccessDenied(reasons::ORGANISER_NOT_APPROVED)));
    assert!(m.registry.official_listing(ListingId::new(1)).unwrap().is_active());
}
