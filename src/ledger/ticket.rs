// Ticket ledger - fungible per-class balances with operator approval

use crate::error::{reasons, TicketError};
use crate::identity::Address;
use crate::{Amount, ClassId, Quantity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Supply and price bookkeeping for one ticket class
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketClass {
    class_id: ClassId,
    unit_price: Option<Amount>,
    minted: Quantity,
    burned: Quantity,
}

impl TicketClass {
    fn new(class_id: ClassId) -> Self {
        Self {
            class_id,
            ..Self::default()
        }
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Unit price, once the issuer has set it
    pub fn unit_price(&self) -> Option<Amount> {
        self.unit_price
    }

    pub fn minted(&self) -> Quantity {
        self.minted
    }

    pub fn burned(&self) -> Quantity {
        self.burned
    }

    /// Tickets still in existence (minted minus burned)
    pub fn outstanding(&self) -> Quantity {
        self.minted - self.burned
    }
}

/// The ticket ledger for one event.
///
/// The whole supply is minted to the issuer at construction; afterwards
/// balances only move by `transfer` and only shrink by `burn`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLedger {
    /// Address of this ledger
    address: Address,
    /// The issuing organiser
    owner: Address,
    /// Metadata URI shared by all classes
    uri: String,
    /// Event engine allowed to move the issuer's inventory
    event_contract: Option<Address>,
    /// (holder, class) -> quantity; zero balances are removed
    balances: BTreeMap<(Address, ClassId), Quantity>,
    /// (owner, operator) pairs with transfer approval
    approvals: BTreeSet<(Address, Address)>,
    /// Per-class supply and price
    classes: BTreeMap<ClassId, TicketClass>,
}

impl TicketLedger {
    /// Create a ledger and mint `supply` to the owner
    pub fn new<I>(address: Address, owner: Address, uri: &str, supply: I) -> Result<Self, TicketError>
    where
        I: IntoIterator<Item = (ClassId, Quantity)>,
    {
        let mut ledger = Self {
            address,
            owner,
            uri: uri.to_string(),
            event_contract: None,
            balances: BTreeMap::new(),
            approvals: BTreeSet::new(),
            classes: BTreeMap::new(),
        };

        for (class_id, quantity) in supply {
            let class = ledger
                .classes
                .entry(class_id)
                .or_insert_with(|| TicketClass::new(class_id));
            class.minted = class.minted.checked_add(quantity).ok_or(TicketError::Overflow)?;

            let balance = ledger.balances.entry((owner, class_id)).or_insert(0);
            *balance = balance.checked_add(quantity).ok_or(TicketError::Overflow)?;
        }
        ledger.balances.retain(|_, qty| *qty > 0);

        Ok(ledger)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The issuing organiser
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Event engine this ledger is bound to
    pub fn event_contract(&self) -> Option<&Address> {
        self.event_contract.as_ref()
    }

    /// Bind the ledger to its event engine (issuer only, once)
    pub fn bind_event(&mut self, caller: &Address, event: Address) -> Result<(), TicketError> {
        if *caller != self.owner {
            return Err(TicketError::AccessDenied(reasons::NOT_LEDGER_OWNER));
        }
        if self.event_contract.is_some_and(|bound| bound != event) {
            return Err(TicketError::AccessDenied("Ticket ledger is already bound to an event"));
        }
        self.event_contract = Some(event);
        Ok(())
    }

    // ========================================================================
    // BALANCE QUERIES
    // ========================================================================

    /// Quantity of `class_id` held by `holder`
    pub fn balance_of(&self, holder: &Address, class_id: ClassId) -> Quantity {
        self.balances.get(&(*holder, class_id)).copied().unwrap_or(0)
    }

    /// Every non-zero (class, quantity) held by `holder`
    pub fn holdings_of(&self, holder: &Address) -> Vec<(ClassId, Quantity)> {
        self.balances
            .iter()
            .filter(|((owner, _), _)| owner == holder)
            .map(|((_, class_id), qty)| (*class_id, *qty))
            .collect()
    }

    /// Quantity held across all classes
    pub fn total_balance_of(&self, holder: &Address) -> Quantity {
        self.holdings_of(holder).iter().map(|(_, qty)| *qty).sum()
    }

    /// Sum of all balances of one class
    pub fn circulating(&self, class_id: ClassId) -> Quantity {
        self.balances
            .iter()
            .filter(|((_, class), _)| *class == class_id)
            .map(|(_, qty)| *qty)
            .sum()
    }

    /// All holders of one class with their quantities
    pub fn holders(&self, class_id: ClassId) -> Vec<(Address, Quantity)> {
        self.balances
            .iter()
            .filter(|((_, class), _)| *class == class_id)
            .map(|((holder, _), qty)| (*holder, *qty))
            .collect()
    }

    pub fn class(&self, class_id: ClassId) -> Option<&TicketClass> {
        self.classes.get(&class_id)
    }

    pub fn classes(&self) -> impl Iterator<Item = &TicketClass> {
        self.classes.values()
    }

    /// Check that every class balances to minted minus burned
    pub fn is_conserved(&self) -> bool {
        self.classes
            .values()
            .all(|class| self.circulating(class.class_id) == class.outstanding())
    }

    // ========================================================================
    // APPROVALS
    // ========================================================================

    /// Allow or revoke `operator` moving every class `owner` holds
    pub fn set_approval_for_all(&mut self, owner: &Address, operator: &Address, allowed: bool) {
        if allowed {
            self.approvals.insert((*owner, *operator));
        } else {
            self.approvals.remove(&(*owner, *operator));
        }
        debug!(owner = %owner.short(), operator = %operator.short(), allowed, "approval updated");
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.approvals.contains(&(*owner, *operator))
    }

    /// Whether `caller` may move tickets out of `from`.
    ///
    /// The bound event engine is an implicit operator for the issuer's
    /// unsold inventory.
    pub fn can_move(&self, caller: &Address, from: &Address) -> bool {
        caller == from
            || self.is_approved_for_all(from, caller)
            || (*from == self.owner && self.event_contract.as_ref() == Some(caller))
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Move `quantity` of `class_id` from `from` to `to`
    pub fn transfer(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        class_id: ClassId,
        quantity: Quantity,
    ) -> Result<(), TicketError> {
        let available = self.balance_of(from, class_id);
        if available < quantity {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_BALANCE,
                available,
                required: quantity,
            });
        }
        if !self.can_move(caller, from) {
            return Err(TicketError::UnapprovedTransfer(reasons::NOT_OPERATOR));
        }
        if from == to || quantity == 0 {
            return Ok(());
        }

        // Both sides are computed before either is written
        let from_after = available - quantity;
        let to_after = self
            .balance_of(to, class_id)
            .checked_add(quantity)
            .ok_or(TicketError::Overflow)?;

        self.write_balance(*from, class_id, from_after);
        self.write_balance(*to, class_id, to_after);

        debug!(
            from = %from.short(),
            to = %to.short(),
            class_id,
            quantity,
            "tickets transferred"
        );
        Ok(())
    }

    /// Destroy `quantity` of `holder`'s tickets. Only refunds burn.
    pub(crate) fn burn(&mut self, holder: &Address, class_id: ClassId, quantity: Quantity) -> Result<(), TicketError> {
        let available = self.balance_of(holder, class_id);
        if available < quantity {
            return Err(TicketError::InsufficientInventory {
                reason: reasons::NOT_ENOUGH_BALANCE,
                available,
                required: quantity,
            });
        }
        let class = self
            .classes
            .get_mut(&class_id)
            .ok_or(TicketError::UnknownClass(class_id))?;

        class.burned += quantity;
        self.write_balance(*holder, class_id, available - quantity);

        debug!(holder = %holder.short(), class_id, quantity, "tickets burned");
        Ok(())
    }

    fn write_balance(&mut self, holder: Address, class_id: ClassId, quantity: Quantity) {
        if quantity == 0 {
            self.balances.remove(&(holder, class_id));
        } else {
            self.balances.insert((holder, class_id), quantity);
        }
    }

    // ========================================================================
    // PRICING
    // ========================================================================

    /// Set the unit price of a minted class (issuer only, once)
    pub fn set_price(&mut self, caller: &Address, class_id: ClassId, price: Amount) -> Result<(), TicketError> {
        if *caller != self.owner {
            return Err(TicketError::AccessDenied(reasons::NOT_LEDGER_OWNER));
        }
        let class = self
            .classes
            .get_mut(&class_id)
            .ok_or(TicketError::UnknownClass(class_id))?;
        if class.unit_price.is_some() {
            return Err(TicketError::PriceAlreadySet(class_id));
        }

        class.unit_price = Some(price);
        debug!(class_id, price, "ticket price set");
        Ok(())
    }

    /// Unit price of a class
    pub fn price(&self, class_id: ClassId) -> Result<Amount, TicketError> {
        self.classes
            .get(&class_id)
            .and_then(|class| class.unit_price)
            .ok_or(TicketError::UnknownClass(class_id))
    }
}
