// Escrow - custody of one event's sale proceeds

use crate::error::{reasons, TicketError};
use crate::identity::Address;
use crate::{Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// Why funds left the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutKind {
    /// Overpayment returned to the buyer
    Change,
    /// Resale price forwarded to the seller
    ResaleProceeds,
    /// Refund to a ticket holder
    Refund,
    /// Remaining proceeds released to the organiser
    Withdrawal,
}

/// Funds owed to an address as the result of an operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    to: Address,
    amount: Amount,
    kind: PayoutKind,
}

impl Payout {
    pub fn new(to: Address, amount: Amount, kind: PayoutKind) -> Self {
        Self { to, amount, kind }
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> PayoutKind {
        self.kind
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowDirection {
    Deposit,
    Payout,
}

/// One movement in or out of escrow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    direction: EscrowDirection,
    counterparty: Address,
    amount: Amount,
    at: Timestamp,
}

impl EscrowRecord {
    pub fn direction(&self) -> EscrowDirection {
        self.direction
    }

    pub fn counterparty(&self) -> &Address {
        &self.counterparty
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn at(&self) -> Timestamp {
        self.at
    }
}

/// Per-event escrow sub-account.
///
/// `balance == total_deposited - total_paid_out` at all times.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    balance: Amount,
    total_deposited: Amount,
    total_paid_out: Amount,
    records: Vec<EscrowRecord>,
}

impl Escrow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Funds currently held
    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    pub fn total_paid_out(&self) -> Amount {
        self.total_paid_out
    }

    pub fn records(&self) -> &[EscrowRecord] {
        &self.records
    }

    /// Check a deposit would not overflow
    pub fn can_accept(&self, amount: Amount) -> bool {
        self.balance.checked_add(amount).is_some() && self.total_deposited.checked_add(amount).is_some()
    }

    /// Check the escrow can cover a payout
    pub fn can_cover(&self, amount: Amount) -> bool {
        self.balance >= amount
    }

    /// Take custody of sale proceeds
    pub fn deposit(&mut self, from: Address, amount: Amount, at: Timestamp) -> Result<(), TicketError> {
        let balance = self.balance.checked_add(amount).ok_or(TicketError::Overflow)?;
        let total = self.total_deposited.checked_add(amount).ok_or(TicketError::Overflow)?;

        self.balance = balance;
        self.total_deposited = total;
        self.records.push(EscrowRecord {
            direction: EscrowDirection::Deposit,
            counterparty: from,
            amount,
            at,
        });
        Ok(())
    }

    /// Release `amount` to `to`
    pub fn pay_out(
        &mut self,
        to: Address,
        amount: Amount,
        kind: PayoutKind,
        at: Timestamp,
    ) -> Result<Payout, TicketError> {
        if !self.can_cover(amount) {
            return Err(TicketError::InsufficientFunds {
                reason: reasons::NOT_ENOUGH_ESCROW,
                sent: self.balance,
                required: amount,
            });
        }

        self.balance -= amount;
        self.total_paid_out += amount;
        self.records.push(EscrowRecord {
            direction: EscrowDirection::Payout,
            counterparty: to,
            amount,
            at,
        });
        Ok(Payout::new(to, amount, kind))
    }

    /// Release everything held to `to`
    pub fn drain(&mut self, to: Address, kind: PayoutKind, at: Timestamp) -> Payout {
        let amount = self.balance;
        self.balance = 0;
        self.total_paid_out += amount;
        self.records.push(EscrowRecord {
            direction: EscrowDirection::Payout,
            counterparty: to,
            amount,
            at,
        });
        Payout::new(to, amount, kind)
    }
}
