// Invariants that must hold after every committed operation

use crate::event::engine::EventEngine;
use crate::identity::Address;
use crate::{Amount, ClassId, Quantity};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("Class {class_id} does not balance: circulating {circulating}, outstanding {outstanding}")]
    ConservationBroken {
        class_id: ClassId,
        circulating: Quantity,
        outstanding: Quantity,
    },

    #[error("{holder} used {used} of class {class_id} but holds {held}")]
    UsageExceedsBalance {
        holder: Address,
        class_id: ClassId,
        used: Quantity,
        held: Quantity,
    },

    #[error("Refund tally {tally} differs from the sum of vote weights {weights}")]
    VoteTallyMismatch { tally: Quantity, weights: Quantity },

    #[error("Escrow holds {balance} but deposits minus payouts is {expected}")]
    EscrowImbalance { balance: Amount, expected: Amount },
}

/// Check every state invariant of one event
pub fn check_invariants(engine: &EventEngine) -> Result<(), InvariantError> {
    let ledger = engine.ledger();

    for class in ledger.classes() {
        let circulating = ledger.circulating(class.class_id());
        if circulating != class.outstanding() {
            return Err(InvariantError::ConservationBroken {
                class_id: class.class_id(),
                circulating,
                outstanding: class.outstanding(),
            });
        }
    }

    for ((holder, class_id), used) in engine.usage() {
        let held = ledger.balance_of(holder, *class_id);
        if *used > held {
            return Err(InvariantError::UsageExceedsBalance {
                holder: *holder,
                class_id: *class_id,
                used: *used,
                held,
            });
        }
    }

    let weights: Quantity = engine.voters().map(|(_, weight)| *weight).sum();
    if weights != engine.refund_votes() {
        return Err(InvariantError::VoteTallyMismatch {
            tally: engine.refund_votes(),
            weights,
        });
    }

    let escrow = engine.escrow();
    let expected = escrow.total_deposited() - escrow.total_paid_out();
    if escrow.balance() != expected {
        return Err(InvariantError::EscrowImbalance {
            balance: escrow.balance(),
            expected,
        });
    }

    Ok(())
}
