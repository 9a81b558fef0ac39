// Event engine - per-event state machine over the ticket ledger

use crate::error::{reasons, TicketError};
use crate::event::invariants::{check_invariants, InvariantError};
use crate::event::phase::{Phase, Schedule};
use crate::event::quorum::RefundQuorum;
use crate::identity::Address;
use crate::journal::{Journal, LogEntry, TicketEvent};
use crate::ledger::{Escrow, Payout, PayoutKind, TicketLedger};
use crate::{Amount, ClassId, Quantity, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Construction parameters for an [`EventEngine`]
#[derive(Clone, Debug)]
pub struct EventSetup {
    pub address: Address,
    pub organiser: Address,
    pub name: String,
    pub schedule: Schedule,
    pub marketplace: Address,
    pub quorum: RefundQuorum,
}

/// A holder-to-holder sale at `ask_price` per ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResaleOrder {
    pub seller: Address,
    pub buyer: Address,
    pub class_id: ClassId,
    pub quantity: Quantity,
    pub ask_price: Amount,
}

/// What a committed operation emitted and who is owed funds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    entry: LogEntry,
    payouts: Vec<Payout>,
}

impl Receipt {
    fn new(entry: LogEntry) -> Self {
        Self {
            entry,
            payouts: Vec::new(),
        }
    }

    fn with_payout(mut self, payout: Payout) -> Self {
        if payout.amount() > 0 {
            self.payouts.push(payout);
        }
        self
    }

    pub fn entry(&self) -> &LogEntry {
        &self.entry
    }

    pub fn event(&self) -> &TicketEvent {
        self.entry.event()
    }

    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    /// Total paid to `to` by this operation
    pub fn paid_to(&self, to: &Address) -> Amount {
        self.payouts
            .iter()
            .filter(|p| p.to() == to)
            .map(|p| p.amount())
            .sum()
    }
}

/// One event: its schedule, its ticket ledger, its escrow and its votes.
///
/// Every operation checks all of its preconditions before the first write,
/// so a returned error means nothing changed and nothing was journaled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEngine {
    address: Address,
    organiser: Address,
    name: String,
    schedule: Schedule,
    marketplace: Address,
    quorum: RefundQuorum,
    ledger: TicketLedger,
    escrow: Escrow,
    total_tickets_sold: Quantity,
    /// (holder, class) -> tickets redeemed at the door
    used: BTreeMap<(Address, ClassId), Quantity>,
    refund_votes: Quantity,
    /// voter -> weight counted when the vote was cast
    voters: BTreeMap<Address, Quantity>,
    withdrawn: bool,
    journal: Journal,
}

impl EventEngine {
    /// Create the engine and bind `ledger` to it.
    ///
    /// The ledger must have been issued by the organiser.
    pub fn new(setup: EventSetup, mut ledger: TicketLedger) -> Result<Self, TicketError> {
        if *ledger.owner() != setup.organiser {
            return Err(TicketError::AccessDenied(reasons::NOT_LEDGER_OWNER));
        }
        ledger.bind_event(&setup.organiser, setup.address)?;

        info!(
            event = %setup.address.short(),
            name = %setup.name,
            sale_date = setup.schedule.sale_date(),
            event_date = setup.schedule.event_date(),
            "event created"
        );

        Ok(Self {
            address: setup.address,
            organiser: setup.organiser,
            name: setup.name,
            schedule: setup.schedule,
            marketplace: setup.marketplace,
            quorum: setup.quorum,
            ledger,
            escrow: Escrow::new(),
            total_tickets_sold: 0,
            used: BTreeMap::new(),
            refund_votes: 0,
            voters: BTreeMap::new(),
            withdrawn: false,
            journal: Journal::new(),
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn organiser(&self) -> &Address {
        &self.organiser
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn marketplace(&self) -> &Address {
        &self.marketplace
    }

    pub fn quorum(&self) -> RefundQuorum {
        self.quorum
    }

    /// Address of the bound ticket ledger
    pub fn ticket_contract(&self) -> &Address {
        self.ledger.address()
    }

    pub fn ledger(&self) -> &TicketLedger {
        &self.ledger
    }

    pub fn escrow(&self) -> &Escrow {
        &self.escrow
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn total_tickets_sold(&self) -> Quantity {
        self.total_tickets_sold
    }

    pub fn refund_votes(&self) -> Quantity {
        self.refund_votes
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voters.contains_key(voter)
    }

    /// Weight `voter` contributed, if they voted
    pub fn vote_weight(&self, voter: &Address) -> Option<Quantity> {
        self.voters.get(voter).copied()
    }

    pub fn voters(&self) -> impl Iterator<Item = (&Address, &Quantity)> {
        self.voters.iter()
    }

    /// Tickets of `class_id` that `holder` has redeemed
    pub fn tickets_used(&self, holder: &Address, class_id: ClassId) -> Quantity {
        self.used.get(&(*holder, class_id)).copied().unwrap_or(0)
    }

    /// Tickets redeemed by `holder` across classes
    pub fn total_used(&self, holder: &Address) -> Quantity {
        self.used
            .iter()
            .filter(|((h, _), _)| h == holder)
            .map(|(_, qty)| *qty)
            .sum()
    }

    pub(crate) fn usage(&self) -> impl Iterator<Item = (&(Address, ClassId), &Quantity)> {
        self.used.iter()
    }

    /// Held and not yet redeemed
    pub fn unused_tickets(&self, holder: &Address, class_id: ClassId) -> Quantity {
        self.ledger
            .balance_of(holder, class_id)
            .saturating_sub(self.tickets_used(holder, class_id))
    }

    pub fn phase(&self, now: Timestamp) -> Phase {
        self.schedule.phase_at(now)
    }

    /// The refund predicate shared by `handle_refund` and `handle_withdraw`
    pub fn refund_threshold_met(&self) -> bool {
        self.quorum.is_met(self.refund_votes, self.total_tickets_sold)
    }

    /// Whether the escrow has been released to the organiser
    pub fn funds_withdrawn(&self) -> bool {
        self.withdrawn
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        check_invariants(self)
    }

    // ========================================================================
    // PRECONDITIONS
    // ========================================================================

    fn require_phase(&self, now: Timestamp, expected: Phase) -> Result<(), TicketError> {
        let phase = self.phase(now);
        if phase != expected {
            debug!(event = %self.address.short(), %phase, %expected, "phase gate closed");
            return Err(TicketError::PhaseViolation(reasons::PHASE_UNAVAILABLE));
        }
        Ok(())
    }

    fn is_platform(&self, caller: &Address) -> bool {
        *caller == self.organiser || *caller == self.marketplace
    }

    fn require_platform(&self, caller: &Address) -> Result<(), TicketError> {
        if !self.is_platform(caller) {
            return Err(TicketError::AccessDenied(reasons::NOT_APPROVED_PLATFORM));
        }
        Ok(())
    }

    /// Approved platforms may act for anyone; everyone else only for themselves
    fn require_principal(&self, caller: &Address, principal: &Address) -> Result<(), TicketError> {
        if caller != principal && !self.is_platform(caller) {
            return Err(TicketError::AccessDenied(reasons::NOT_PRINCIPAL));
        }
        Ok(())
    }

    /// Unsold inventory is paid into escrow on the way out, never given away
    fn require_not_organiser(&self, from: &Address) -> Result<(), TicketError> {
        if *from == self.organiser {
            debug!(event = %self.address.short(), "organiser inventory outside an official sale");
            return Err(TicketError::AccessDenied(reasons::ORGANISER_SELLS_OFFICIALLY));
        }
        Ok(())
    }

    fn require_payment(payment: Amount, required: Amount) -> Result<(), TicketError> {
        if payment < required {
            return Err(TicketError::InsufficientFunds {
                reason: reasons::NOT_ENOUGH_FUNDS,
                sent: payment,
                required,
            });
        }
        Ok(())
    }

    fn cost(unit_price: Amount, quantity: Quantity) -> Result<Amount, TicketError> {
        unit_price
            .checked_mul(quantity as Amount)
            .ok_or(TicketError::Overflow)
    }

    // ========================================================================
    // LEDGER PASS-THROUGHS
    // ========================================================================

    /// Issuer sets a class price (once)
    pub fn set_ticket_price(&mut self, caller: &Address, class_id: ClassId, price: Amount) -> Result<(), TicketError> {
        self.ledger.set_price(caller, class_id, price)
    }

    /// `owner` grants or revokes `operator`
    pub fn set_approval_for_all(&mut self, owner: &Address, operator: &Address, allowed: bool) {
        self.ledger.set_approval_for_all(owner, operator, allowed);
    }

    /// Move tickets between holders. Redeemed tickets stay with their holder.
    pub fn transfer(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        class_id: ClassId,
        quantity: Quantity,
    ) -> Result<(), TicketError> {
        self.require_not_organiser(from)?;
        let available = self.unused_tickets(from, class_id);
        if available < quantity {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_BALANCE,
                available,
                required: quantity,
            });
        }
        self.ledger.transfer(caller, from, to, class_id, quantity)
    }

    // ========================================================================
    // PRIMARY SALE
    // ========================================================================

    /// Sell `quantity` of the organiser's inventory to `buyer` at list price
    pub fn process_official_sale(
        &mut self,
        caller: &Address,
        buyer: &Address,
        class_id: ClassId,
        quantity: Quantity,
        payment: Amount,
        now: Timestamp,
    ) -> Result<Receipt, TicketError> {
        if quantity == 0 {
            return Err(TicketError::ZeroQuantity);
        }
        self.require_phase(now, Phase::Sale)?;
        self.require_platform(caller)?;

        let cost = Self::cost(self.ledger.price(class_id)?, quantity)?;
        Self::require_payment(payment, cost)?;

        let organiser = self.organiser;
        let available = self.unused_tickets(&organiser, class_id);
        if available < quantity {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_BALANCE,
                available,
                required: quantity,
            });
        }

        let sold_after = self
            .total_tickets_sold
            .checked_add(quantity)
            .ok_or(TicketError::Overflow)?;
        if !self.escrow.can_accept(cost) {
            return Err(TicketError::Overflow);
        }
        if self.ledger.balance_of(buyer, class_id).checked_add(quantity).is_none() {
            return Err(TicketError::Overflow);
        }

        // Commit
        let engine = self.address;
        self.ledger.transfer(&engine, &organiser, buyer, class_id, quantity)?;
        self.escrow.deposit(*buyer, cost, now)?;
        self.total_tickets_sold = sold_after;

        let entry = self.journal.emit(
            engine,
            now,
            TicketEvent::OfficialTicketPurchased {
                buyer: *buyer,
                quantity,
                class_id,
            },
        );
        info!(
            event = %engine.short(),
            buyer = %buyer.short(),
            class_id,
            quantity,
            cost,
            "official tickets sold"
        );

        Ok(Receipt::new(entry).with_payout(Payout::new(*buyer, payment - cost, PayoutKind::Change)))
    }

    // ========================================================================
    // RESALE
    // ========================================================================

    /// Move a holder's tickets to a buyer at no more than list price
    pub fn process_resale(
        &mut self,
        caller: &Address,
        order: &ResaleOrder,
        payment: Amount,
        now: Timestamp,
    ) -> Result<Receipt, TicketError> {
        let ResaleOrder {
            seller,
            buyer,
            class_id,
            quantity,
            ask_price,
        } = *order;

        if quantity == 0 {
            return Err(TicketError::ZeroQuantity);
        }
        self.require_principal(caller, &seller)?;
        self.require_not_organiser(&seller)?;

        let cap = self.ledger.price(class_id)?;
        if ask_price > cap {
            return Err(TicketError::PriceCapExceeded { asked: ask_price, cap });
        }

        let available = self.unused_tickets(&seller, class_id);
        if available < quantity {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_TO_SELL,
                available,
                required: quantity,
            });
        }

        let engine = self.address;
        if !self.ledger.is_approved_for_all(&seller, &engine) {
            return Err(TicketError::UnapprovedTransfer(reasons::APPROVE_ENGINE_FIRST));
        }

        let total = Self::cost(ask_price, quantity)?;
        Self::require_payment(payment, total)?;
        if self.ledger.balance_of(&buyer, class_id).checked_add(quantity).is_none() {
            return Err(TicketError::Overflow);
        }

        // Commit
        self.ledger.transfer(&engine, &seller, &buyer, class_id, quantity)?;

        let entry = self.journal.emit(
            engine,
            now,
            TicketEvent::ResaleTicketPurchased {
                seller,
                buyer,
                quantity,
                class_id,
                total_price_paid: total,
            },
        );
        info!(
            event = %engine.short(),
            seller = %seller.short(),
            buyer = %buyer.short(),
            class_id,
            quantity,
            total,
            "resale settled"
        );

        Ok(Receipt::new(entry)
            .with_payout(Payout::new(seller, total, PayoutKind::ResaleProceeds))
            .with_payout(Payout::new(buyer, payment - total, PayoutKind::Change)))
    }

    // ========================================================================
    // REDEMPTION
    // ========================================================================

    /// Mark tickets as used at the door. Nothing is burned.
    pub fn process_ticket_usage(
        &mut self,
        caller: &Address,
        holder: &Address,
        class_id: ClassId,
        quantity: Quantity,
        now: Timestamp,
    ) -> Result<Receipt, TicketError> {
        if quantity == 0 {
            return Err(TicketError::ZeroQuantity);
        }
        self.require_phase(now, Phase::Event)?;
        self.require_principal(caller, holder)?;

        let available = self.unused_tickets(holder, class_id);
        if available < quantity {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_TO_USE,
                available,
                required: quantity,
            });
        }

        // Commit
        *self.used.entry((*holder, class_id)).or_insert(0) += quantity;

        let entry = self.journal.emit(
            self.address,
            now,
            TicketEvent::TicketUsed {
                holder: *holder,
                quantity,
                class_id,
            },
        );
        info!(event = %self.address.short(), holder = %holder.short(), class_id, quantity, "tickets used");

        Ok(Receipt::new(entry))
    }

    // ========================================================================
    // REFUND VOTE
    // ========================================================================

    /// Cast `voter`'s refund vote, weighted by everything they hold right now
    pub fn vote(&mut self, caller: &Address, voter: &Address, now: Timestamp) -> Result<Receipt, TicketError> {
        self.require_phase(now, Phase::Vote)?;
        self.require_principal(caller, voter)?;

        let weight = self.ledger.total_balance_of(voter);
        if weight == 0 {
            return Err(TicketError::AccessDenied(reasons::MUST_HOLD_TO_VOTE));
        }
        if self.has_voted(voter) {
            return Err(TicketError::AlreadyVoted(reasons::ALREADY_VOTED));
        }
        let votes_after = self.refund_votes.checked_add(weight).ok_or(TicketError::Overflow)?;

        // Commit
        self.refund_votes = votes_after;
        self.voters.insert(*voter, weight);

        let entry = self.journal.emit(
            self.address,
            now,
            TicketEvent::Voted {
                voter: *voter,
                refund_votes: votes_after,
            },
        );
        info!(
            event = %self.address.short(),
            voter = %voter.short(),
            weight,
            refund_votes = votes_after,
            "refund vote cast"
        );

        Ok(Receipt::new(entry))
    }

    // ========================================================================
    // SETTLEMENT
    // ========================================================================

    /// Burn everything `holder` owns and repay it at list price
    pub fn handle_refund(&mut self, caller: &Address, holder: &Address, now: Timestamp) -> Result<Receipt, TicketError> {
        self.require_phase(now, Phase::End)?;
        if !self.refund_threshold_met() {
            return Err(TicketError::ThresholdNotMet(reasons::THRESHOLD_NOT_MET));
        }
        self.require_principal(caller, holder)?;
        if *holder == self.organiser {
            return Err(TicketError::AccessDenied(reasons::ORGANISER_NOT_REFUNDABLE));
        }

        let holdings = self.ledger.holdings_of(holder);
        let quantity: Quantity = holdings.iter().map(|(_, qty)| *qty).sum();
        if quantity == 0 {
            return Err(TicketError::AccessDenied(reasons::NO_TICKETS_HELD));
        }

        let mut amount: Amount = 0;
        for (class_id, qty) in &holdings {
            let value = Self::cost(self.ledger.price(*class_id)?, *qty)?;
            amount = amount.checked_add(value).ok_or(TicketError::Overflow)?;
        }
        if !self.escrow.can_cover(amount) {
            return Err(TicketError::InsufficientFunds {
                reason: reasons::NOT_ENOUGH_ESCROW,
                sent: self.escrow.balance(),
                required: amount,
            });
        }

        // Commit
        for (class_id, qty) in &holdings {
            self.ledger.burn(holder, *class_id, *qty)?;
        }
        self.used.retain(|(h, _), _| h != holder);
        let payout = self.escrow.pay_out(*holder, amount, PayoutKind::Refund, now)?;

        let entry = self.journal.emit(
            self.address,
            now,
            TicketEvent::RefundsIssued {
                holder: *holder,
                quantity,
                refund_amount: amount,
            },
        );
        info!(
            event = %self.address.short(),
            holder = %holder.short(),
            quantity,
            amount,
            "refund issued"
        );

        Ok(Receipt::new(entry).with_payout(payout))
    }

    /// Release the escrow to the organiser once refunds are ruled out
    pub fn handle_withdraw(&mut self, caller: &Address, now: Timestamp) -> Result<Receipt, TicketError> {
        self.require_phase(now, Phase::End)?;
        if self.refund_threshold_met() {
            return Err(TicketError::ThresholdMet(reasons::THRESHOLD_MET));
        }
        if self.withdrawn {
            return Err(TicketError::AccessDenied(reasons::ALREADY_WITHDRAWN));
        }

        // Commit
        self.withdrawn = true;
        let payout = self.escrow.drain(self.organiser, PayoutKind::Withdrawal, now);
        let entry = self.journal.emit(self.address, now, TicketEvent::FundsWithdrawn);
        info!(
            event = %self.address.short(),
            caller = %caller.short(),
            amount = payout.amount(),
            "funds withdrawn to organiser"
        );

        Ok(Receipt::new(entry).with_payout(payout))
    }
}
