// Property Tests
// Invariants checked after every step of long seeded operation sequences;
// a rejected step must leave the event exactly as it was

use crate::common::{fixture, EVENT, PRICE, SALE, SUPPLY, VOTE, END};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tixmesh::error::TicketError;
use tixmesh::event::ResaleOrder;
use tixmesh::identity::Address;

fn holders() -> Vec<Address> {
    (0..6).map(|i| Address::from_label(&format!("holder-{}", i))).collect()
}

fn circulating_plus_burned(f: &crate::common::Fixture) -> u64 {
    let ledger = f.engine.ledger();
    ledger.circulating(0) + ledger.class(0).unwrap().burned()
}

#[test]
fn test_conservation_through_random_trading() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut f = fixture();
        let mut holders = holders();
        holders.push(f.organiser);
        for holder in &holders {
            f.approve_engine(holder);
        }
        let marketplace = f.marketplace;

        for step in 0..200 {
            let now = if step < 100 { SALE } else { EVENT };
            let a = holders[rng.gen_range(0..holders.len())];
            let b = holders[rng.gen_range(0..holders.len())];
            let quantity = rng.gen_range(1..4);
            let before = f.engine.clone();

            let result = match rng.gen_range(0..4) {
                0 => f
                    .engine
                    .process_official_sale(&marketplace, &a, 0, quantity, PRICE * quantity as u128, now)
                    .map(|_| ()),
                1 => {
                    let order = ResaleOrder {
                        seller: a,
                        buyer: b,
                        class_id: 0,
                        quantity,
                        ask_price: rng.gen_range(0..=PRICE + 2),
                    };
                    f.engine.process_resale(&marketplace, &order, PRICE * 3, now).map(|_| ())
                }
                2 => f.engine.transfer(&a, &a, &b, 0, quantity),
                _ => f.engine.process_ticket_usage(&a, &a, 0, quantity, now).map(|_| ()),
            };

            if let Err(TicketError::PriceCapExceeded { asked, cap }) = result {
                assert!(asked > cap);
            }
            if result.is_err() {
                assert_eq!(f.engine, before, "rejected step changed state: seed {} step {}", seed, step);
            }
            assert_eq!(circulating_plus_burned(&f), SUPPLY, "seed {} step {}", seed, step);
            assert!(f.engine.check_invariants().is_ok(), "seed {} step {}", seed, step);
        }
    }
}

#[test]
fn test_votes_then_exactly_one_settlement() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut f = fixture();
        let holders = holders();
        let organiser = f.organiser;

        for holder in &holders {
            f.sell(holder, rng.gen_range(1..5));
        }
        for holder in &holders {
            if rng.gen_bool(0.5) {
                f.engine.vote(holder, holder, VOTE).unwrap();
                assert!(f.engine.vote(holder, holder, VOTE).is_err());
            }
        }

        let mut refunds = 0;
        for holder in &holders {
            if f.engine.handle_refund(holder, holder, END).is_ok() {
                refunds += 1;
            }
        }
        let withdrew = f.engine.handle_withdraw(&organiser, END).is_ok();

        assert!(f.engine.check_invariants().is_ok());
        if f.engine.refund_threshold_met() {
            assert_eq!(refunds, holders.len(), "seed {}", seed);
            assert!(!withdrew);
            assert_eq!(f.engine.escrow().balance(), 0);
        } else {
            assert_eq!(refunds, 0, "seed {}", seed);
            assert!(withdrew);
        }
        assert_eq!(circulating_plus_burned(&f), SUPPLY);
    }
}
