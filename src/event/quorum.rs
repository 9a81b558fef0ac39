// Refund quorum - the single predicate behind refund and withdraw

use crate::config::BPS_DENOMINATOR;
use crate::Quantity;
use serde::{Deserialize, Serialize};

/// Fraction of tickets sold whose holders must vote for refunds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundQuorum {
    bps: u64,
}

impl RefundQuorum {
    /// `bps` is clamped to 100%
    pub fn from_bps(bps: u64) -> Self {
        Self {
            bps: bps.min(BPS_DENOMINATOR),
        }
    }

    pub fn bps(&self) -> u64 {
        self.bps
    }

    /// `refund_votes / tickets_sold >= quorum`, in integer arithmetic.
    ///
    /// With nothing sold there is nothing to refund, so the threshold is
    /// never met.
    pub fn is_met(&self, refund_votes: Quantity, tickets_sold: Quantity) -> bool {
        if tickets_sold == 0 {
            return false;
        }
        let votes = refund_votes as u128 * BPS_DENOMINATOR as u128;
        let needed = self.bps as u128 * tickets_sold as u128;
        votes >= needed
    }
}

impl Default for RefundQuorum {
    fn default() -> Self {
        Self::from_bps(5_000)
    }
}
