// Lifecycle Tests
// Whole events driven through the exchange on an injected clock

use std::sync::Arc;
use tixmesh::clock::{parse_timestamp, ManualClock};
use tixmesh::config::EconomyConfig;
use tixmesh::error::{reasons, TicketError};
use tixmesh::event::{Phase, ResaleOrder};
use tixmesh::exchange::{ExchangeError, NewEvent, TicketExchange};
use tixmesh::identity::Address;
use tixmesh::journal::TicketEvent;
use tixmesh::market::{ListingId, Purchase, ResaleOffer};
use tixmesh::Timestamp;

const DAY: Timestamp = 86_400;

struct World {
    exchange: TicketExchange<Arc<ManualClock>>,
    clock: Arc<ManualClock>,
    event: Address,
    owner: Address,
    organiser: Address,
}

fn user(n: u8) -> Address {
    Address::from_label(&format!("user{}", n))
}

fn rejection(result: Result<impl std::fmt::Debug, ExchangeError>) -> TicketError {
    match result {
        Err(ExchangeError::Ticket(e)) => e,
        other => panic!("expected a ticket rejection, got {:?}", other),
    }
}

/// Event on 2025-12-01 with the default schedule; clock starts a week
/// before the sale opens.
fn world() -> World {
    let event_date = parse_timestamp("2025-12-01T00:00:00Z").unwrap();
    let clock = Arc::new(ManualClock::new(event_date - 37 * DAY));
    let owner = Address::from_label("marketplace");
    let organiser = Address::from_label("organiser");

    let mut exchange = TicketExchange::new(EconomyConfig::default(), owner, clock.clone()).unwrap();
    exchange.approve_organiser(&owner, &organiser).unwrap();
    let event = exchange
        .create_event(&organiser, NewEvent::new("Test Event", event_date).with_class(0, 10_000, 10))
        .unwrap();
    exchange.list_official(&organiser, &event, 0).unwrap();

    World {
        exchange,
        clock,
        event,
        owner,
        organiser,
    }
}

impl World {
    fn advance_to(&self, phase: Phase) {
        let start = self.exchange.event(&self.event).unwrap().schedule().starts_at(phase);
        self.clock.advance_to(start).unwrap();
    }

    fn buy(&mut self, buyer: &Address, quantity: u64) {
        let purchase = Purchase {
            event: self.event,
            listing_id: ListingId::new(1),
            quantity,
            payment: 10 * quantity as u128,
        };
        self.exchange.buy_official(buyer, &purchase).unwrap();
    }
}

// ============================================================================
// PHASE PROGRESSION
// ============================================================================

#[test]
fn test_phases_follow_the_clock() {
    let w = world();

    assert_eq!(w.exchange.phase(&w.event).unwrap(), Phase::Presale);
    for phase in [Phase::Sale, Phase::Event, Phase::Vote, Phase::End] {
        w.advance_to(phase);
        assert_eq!(w.exchange.phase(&w.event).unwrap(), phase);
    }
}

#[test]
fn test_default_schedule_offsets() {
    let w = world();
    let schedule = *w.exchange.event(&w.event).unwrap().schedule();

    assert_eq!(schedule.event_date() - schedule.sale_date(), 30 * DAY);
    assert_eq!(schedule.voting_period_start() - schedule.event_date(), DAY);
    assert_eq!(schedule.voting_period_end() - schedule.voting_period_start(), 7 * DAY);
}

#[test]
fn test_presale_purchase_refused() {
    let mut w = world();
    let purchase = Purchase {
        event: w.event,
        listing_id: ListingId::new(1),
        quantity: 1,
        payment: 10,
    };

    let result = w.exchange.buy_official(&user(1), &purchase);

    assert_eq!(rejection(result), TicketError::PhaseViolation(reasons::PHASE_UNAVAILABLE));
}

// ============================================================================
// FULL LIFECYCLES
// ============================================================================

#[test]
fn test_successful_event_pays_organiser() {
    let mut w = world();
    w.advance_to(Phase::Sale);
    for n in 1..=4 {
        w.buy(&user(n), n as u64);
    }

    let event = w.event;
    w.exchange.set_approval_for_all(&user(4), &event, &event, true).unwrap();
    let offer = ResaleOffer {
        event,
        price_per_unit: 10,
        class_id: 0,
        quantity: 2,
    };
    let id = w.exchange.list_resale(&user(4), &offer).unwrap();
    let purchase = Purchase {
        event: w.event,
        listing_id: id,
        quantity: 2,
        payment: 20,
    };
    w.exchange.buy_resale(&user(1), &purchase).unwrap();

    w.advance_to(Phase::Event);
    w.exchange.use_tickets(&user(1), &event, 0, 3).unwrap();

    w.advance_to(Phase::Vote);
    let vote = w.exchange.vote_for_refund(&user(1), &event).unwrap();
    assert_eq!(
        vote.event(),
        &TicketEvent::Voted {
            voter: user(1),
            refund_votes: 3,
        }
    );

    w.advance_to(Phase::End);
    let claim = w.exchange.claim_refund(&user(1), &event);
    assert_eq!(rejection(claim), TicketError::ThresholdNotMet(reasons::THRESHOLD_NOT_MET));

    let organiser = w.organiser;
    let receipt = w.exchange.withdraw(&organiser, &event).unwrap();
    assert_eq!(receipt.paid_to(&organiser), 100);
    assert!(w.exchange.event(&event).unwrap().check_invariants().is_ok());
}

#[test]
fn test_scam_event_refunds_holders() {
    let mut w = world();
    w.advance_to(Phase::Sale);
    w.buy(&user(1), 2);
    w.buy(&user(2), 2);
    let event = w.event;

    w.advance_to(Phase::Vote);
    w.exchange.vote_for_refund(&user(1), &event).unwrap();
    let twice = w.exchange.vote_for_refund(&user(1), &event);
    assert_eq!(rejection(twice), TicketError::AlreadyVoted(reasons::ALREADY_VOTED));

    w.advance_to(Phase::End);
    let organiser = w.organiser;
    let withdraw = w.exchange.withdraw(&organiser, &event);
    assert_eq!(rejection(withdraw), TicketError::ThresholdMet(reasons::THRESHOLD_MET));

    // Holders who did not vote are refunded too
    for n in 1..=2 {
        let refund = w.exchange.claim_refund(&user(n), &event).unwrap();
        assert_eq!(refund.paid_to(&user(n)), 20);
    }
    let engine = w.exchange.event(&event).unwrap();
    assert_eq!(engine.escrow().balance(), 0);
    assert_eq!(engine.ledger().class(0).unwrap().burned(), 4);
    assert_eq!(engine.ledger().circulating(0), 9_996);
}

#[test]
fn test_direct_engine_calls_without_listings() {
    let mut w = world();
    let (event, organiser) = (w.event, w.organiser);
    w.advance_to(Phase::Sale);

    let sale = w.exchange.sell_direct(&organiser, &event, &user(1), 0, 3, 35).unwrap();
    assert_eq!(sale.paid_to(&user(1)), 5);

    w.exchange.set_approval_for_all(&user(1), &event, &user(9), true).unwrap();
    w.exchange.transfer_from(&user(9), &event, &user(1), &user(2), 0, 1).unwrap();
    let stranger = w.exchange.transfer_from(&user(8), &event, &user(1), &user(8), 0, 1);
    assert_eq!(rejection(stranger), TicketError::UnapprovedTransfer(reasons::NOT_OPERATOR));
    let gift = w.exchange.transfer(&organiser, &event, &user(8), 0, 1);
    assert_eq!(rejection(gift), TicketError::AccessDenied(reasons::ORGANISER_SELLS_OFFICIALLY));

    w.exchange.set_approval_for_all(&user(1), &event, &event, true).unwrap();
    let order = ResaleOrder {
        seller: user(1),
        buyer: user(3),
        class_id: 0,
        quantity: 1,
        ask_price: 10,
    };
    let resale = w.exchange.resell_direct(&organiser, &event, &order, 10).unwrap();
    assert_eq!(resale.paid_to(&user(1)), 10);

    w.advance_to(Phase::Vote);
    w.exchange.vote_for_refund(&user(1), &event).unwrap();
    w.exchange.vote_for_refund(&user(2), &event).unwrap();

    w.advance_to(Phase::End);
    let refund = w.exchange.refund_direct(&organiser, &event, &user(3)).unwrap();
    assert_eq!(refund.paid_to(&user(3)), 10);
    let engine = w.exchange.event(&event).unwrap();
    assert_eq!(engine.escrow().balance(), 20);
    assert!(engine.check_invariants().is_ok());
}

#[test]
fn test_clock_rewind_does_not_reopen_sale() {
    let mut w = world();
    w.advance_to(Phase::Event);
    let (event, organiser) = (w.event, w.organiser);
    w.exchange.use_tickets(&organiser, &event, 0, 1).unwrap();

    let rewound = TicketExchange::from_state(w.exchange.into_state(), ManualClock::new(0));

    assert_eq!(rewound.phase(&event).unwrap(), Phase::Event);
}

#[test]
fn test_unknown_event() {
    let mut w = world();
    let missing = Address::from_label("missing");

    let result = w.exchange.vote_for_refund(&user(1), &missing);

    assert_eq!(rejection(result), TicketError::UnknownEvent(missing));
}

#[test]
fn test_only_owner_approves_organisers() {
    let mut w = world();
    let (owner, organiser) = (w.owner, w.organiser);

    let result = w.exchange.approve_organiser(&user(1), &user(2));
    w.exchange.revoke_organiser(&owner, &organiser).unwrap();

    assert_eq!(rejection(result), TicketError::AccessDenied(reasons::NOT_MARKETPLACE_OWNER));
    assert!(!w.exchange.registry().is_organiser_approved(&w.organiser));
}
