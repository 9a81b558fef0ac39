// TicketExchange - bootstrap, wiring and the single clock sample per call

use crate::clock::{Clock, ClockError};
use crate::config::{ConfigError, EconomyConfig};
use crate::error::TicketError;
use crate::event::{EventEngine, EventSetup, Phase, Receipt, RefundQuorum, ResaleOrder};
use crate::exchange::setup::NewEvent;
use crate::identity::{Address, AddressError};
use crate::ledger::TicketLedger;
use crate::market::{ListingId, MarketplaceRegistry, Purchase, ResaleOffer};
use crate::storage::{StoreError, TicketStore};
use crate::{Amount, ClassId, Quantity, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("No exchange has been initialised in this store")]
    NotInitialised,

    #[error("This store already holds an exchange")]
    AlreadyInitialised,
}

impl ExchangeError {
    /// The core rejection, if this is one
    pub fn ticket_error(&self) -> Option<&TicketError> {
        match self {
            ExchangeError::Ticket(e) => Some(e),
            _ => None,
        }
    }
}

/// Everything the exchange persists between calls
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeState {
    pub config: EconomyConfig,
    pub registry: MarketplaceRegistry,
    pub events: BTreeMap<Address, EventEngine>,
    /// Latest instant any operation has observed
    pub watermark: Timestamp,
    /// Bumped per created event so addresses never repeat
    pub nonce: u64,
}

impl ExchangeState {
    pub fn new(config: EconomyConfig, marketplace_owner: Address) -> Self {
        let registry_address = Address::derive("marketplace", &marketplace_owner, "registry", 0);
        Self {
            config,
            registry: MarketplaceRegistry::new(registry_address, marketplace_owner),
            events: BTreeMap::new(),
            watermark: 0,
            nonce: 0,
        }
    }
}

/// The whole economy: one registry and every event it can reach.
///
/// Each mutating call samples the clock exactly once and hands that instant
/// to every phase check it makes. The watermark keeps time from running
/// backwards across calls even when the clock does.
pub struct TicketExchange<C: Clock> {
    state: ExchangeState,
    clock: C,
}

impl<C: Clock> TicketExchange<C> {
    pub fn new(config: EconomyConfig, marketplace_owner: Address, clock: C) -> Result<Self, ExchangeError> {
        config.validate()?;
        info!(owner = %marketplace_owner.short(), "exchange initialised");
        Ok(Self::from_state(ExchangeState::new(config, marketplace_owner), clock))
    }

    pub fn from_state(state: ExchangeState, clock: C) -> Self {
        Self { state, clock }
    }

    /// Resume from a store
    pub fn load(store: &TicketStore, clock: C) -> Result<Self, ExchangeError> {
        let state = store.load_state()?.ok_or(ExchangeError::NotInitialised)?;
        Ok(Self::from_state(state, clock))
    }

    pub fn save(&self, store: &TicketStore) -> Result<(), ExchangeError> {
        store.save_state(&self.state)?;
        store.flush()?;
        Ok(())
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub fn into_state(self) -> ExchangeState {
        self.state
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.state.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn registry(&self) -> &MarketplaceRegistry {
        &self.state.registry
    }

    pub fn event(&self, address: &Address) -> Option<&EventEngine> {
        self.state.events.get(address)
    }

    pub fn events(&self) -> impl Iterator<Item = &EventEngine> {
        self.state.events.values()
    }

    /// Current instant without committing it
    pub fn now(&self) -> Timestamp {
        self.clock.now().max(self.state.watermark)
    }

    pub fn phase(&self, event: &Address) -> Result<Phase, ExchangeError> {
        Ok(self.engine(event)?.phase(self.now()))
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Sample the clock for one operation and advance the watermark
    fn tick(&mut self) -> Timestamp {
        let sampled = self.clock.now();
        if sampled < self.state.watermark {
            warn!(
                sampled,
                watermark = self.state.watermark,
                "clock behind watermark, holding time at watermark"
            );
            return self.state.watermark;
        }
        self.state.watermark = sampled;
        sampled
    }

    fn engine(&self, address: &Address) -> Result<&EventEngine, ExchangeError> {
        self.state
            .events
            .get(address)
            .ok_or(ExchangeError::Ticket(TicketError::UnknownEvent(*address)))
    }

    fn engine_mut(&mut self, address: &Address) -> Result<&mut EventEngine, ExchangeError> {
        self.state
            .events
            .get_mut(address)
            .ok_or(ExchangeError::Ticket(TicketError::UnknownEvent(*address)))
    }

    fn audit(&self, address: &Address) {
        if let Some(engine) = self.state.events.get(address) {
            if let Err(e) = engine.check_invariants() {
                error!(event = %address.short(), error = %e, "invariant broken after commit");
            }
        }
    }

    // ========================================================================
    // MARKETPLACE ADMINISTRATION
    // ========================================================================

    pub fn approve_organiser(&mut self, caller: &Address, organiser: &Address) -> Result<(), ExchangeError> {
        self.tick();
        self.state.registry.approve_organiser(caller, organiser)?;
        Ok(())
    }

    pub fn revoke_organiser(&mut self, caller: &Address, organiser: &Address) -> Result<(), ExchangeError> {
        self.tick();
        self.state.registry.revoke_organiser(caller, organiser)?;
        Ok(())
    }

    // ========================================================================
    // EVENT BOOTSTRAP
    // ========================================================================

    /// Issue a ticket ledger for `organiser`, price its classes, and wire it
    /// to a new event engine that trusts this marketplace.
    pub fn create_event(&mut self, organiser: &Address, new_event: NewEvent) -> Result<Address, ExchangeError> {
        let now = self.tick();
        if new_event.classes.is_empty() || new_event.classes.iter().any(|c| c.supply == 0) {
            return Err(TicketError::ZeroQuantity.into());
        }
        let schedule = new_event.resolve_schedule(&self.state.config)?;

        let nonce = self.state.nonce;
        let ledger_address = Address::derive("ledger", organiser, &new_event.name, nonce);
        let event_address = Address::derive("event", organiser, &new_event.name, nonce);

        let mut ledger = TicketLedger::new(
            ledger_address,
            *organiser,
            &new_event.uri,
            new_event.classes.iter().map(|c| (c.class_id, c.supply)),
        )?;
        for class in &new_event.classes {
            ledger.set_price(organiser, class.class_id, class.price)?;
        }

        let setup = EventSetup {
            address: event_address,
            organiser: *organiser,
            name: new_event.name,
            schedule,
            marketplace: *self.state.registry.address(),
            quorum: RefundQuorum::from_bps(self.state.config.refund_quorum_bps),
        };
        let engine = EventEngine::new(setup, ledger)?;

        info!(
            event = %event_address.short(),
            ledger = %ledger_address.short(),
            phase = %engine.phase(now),
            "event wired to marketplace"
        );
        self.state.nonce += 1;
        self.state.events.insert(event_address, engine);
        Ok(event_address)
    }

    // ========================================================================
    // HOLDER ACTIONS ON THE EVENT
    // ========================================================================

    /// Let `operator` move the caller's tickets for this event
    pub fn set_approval_for_all(
        &mut self,
        caller: &Address,
        event: &Address,
        operator: &Address,
        allowed: bool,
    ) -> Result<(), ExchangeError> {
        self.tick();
        self.engine_mut(event)?.set_approval_for_all(caller, operator, allowed);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        caller: &Address,
        event: &Address,
        to: &Address,
        class_id: ClassId,
        quantity: Quantity,
    ) -> Result<(), ExchangeError> {
        self.transfer_from(caller, event, caller, to, class_id, quantity)
    }

    /// Move `from`'s tickets as `from` or as an operator `from` approved
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        event: &Address,
        from: &Address,
        to: &Address,
        class_id: ClassId,
        quantity: Quantity,
    ) -> Result<(), ExchangeError> {
        self.tick();
        self.engine_mut(event)?.transfer(caller, from, to, class_id, quantity)?;
        self.audit(event);
        Ok(())
    }

    /// Release escrow to the organiser after voting closes without quorum
    pub fn withdraw(&mut self, caller: &Address, event: &Address) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let receipt = self.engine_mut(event)?.handle_withdraw(caller, now)?;
        self.audit(event);
        Ok(receipt)
    }

    // ========================================================================
    // DIRECT ENGINE CALLS
    // ========================================================================

    /// Primary sale made by the organiser without a listing
    pub fn sell_direct(
        &mut self,
        caller: &Address,
        event: &Address,
        buyer: &Address,
        class_id: ClassId,
        quantity: Quantity,
        payment: Amount,
    ) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let receipt = self
            .engine_mut(event)?
            .process_official_sale(caller, buyer, class_id, quantity, payment, now)?;
        self.audit(event);
        Ok(receipt)
    }

    /// Resale settled by the seller or a platform without a listing
    pub fn resell_direct(
        &mut self,
        caller: &Address,
        event: &Address,
        order: &ResaleOrder,
        payment: Amount,
    ) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let receipt = self.engine_mut(event)?.process_resale(caller, order, payment, now)?;
        self.audit(event);
        Ok(receipt)
    }

    /// Refund `holder` straight from the engine, skipping the registry pre-check
    pub fn refund_direct(
        &mut self,
        caller: &Address,
        event: &Address,
        holder: &Address,
    ) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let receipt = self.engine_mut(event)?.handle_refund(caller, holder, now)?;
        self.audit(event);
        Ok(receipt)
    }

    // ========================================================================
    // MARKETPLACE OPERATIONS
    // ========================================================================

    pub fn list_official(
        &mut self,
        caller: &Address,
        event: &Address,
        class_id: ClassId,
    ) -> Result<ListingId, ExchangeError> {
        let now = self.tick();
        let state = &mut self.state;
        Ok(state
            .registry
            .create_official_listing(&state.events, caller, event, class_id, now)?)
    }

    pub fn list_resale(&mut self, caller: &Address, offer: &ResaleOffer) -> Result<ListingId, ExchangeError> {
        let now = self.tick();
        let state = &mut self.state;
        Ok(state.registry.create_resale_listing(&state.events, caller, offer, now)?)
    }

    pub fn buy_official(&mut self, caller: &Address, purchase: &Purchase) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let state = &mut self.state;
        let receipt = state
            .registry
            .buy_official_ticket(&mut state.events, caller, purchase, now)?;
        self.audit(&purchase.event);
        Ok(receipt)
    }

    pub fn buy_resale(&mut self, caller: &Address, purchase: &Purchase) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let state = &mut self.state;
        let receipt = state
            .registry
            .buy_resale_ticket(&mut state.events, caller, purchase, now)?;
        self.audit(&purchase.event);
        Ok(receipt)
    }

    pub fn use_tickets(
        &mut self,
        caller: &Address,
        event: &Address,
        class_id: ClassId,
        quantity: Quantity,
    ) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let state = &mut self.state;
        let receipt = state
            .registry
            .use_ticket(&mut state.events, caller, event, class_id, quantity, now)?;
        self.audit(event);
        Ok(receipt)
    }

    pub fn vote_for_refund(&mut self, caller: &Address, event: &Address) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let state = &mut self.state;
        let receipt = state.registry.vote_for_refund(&mut state.events, caller, event, now)?;
        self.audit(event);
        Ok(receipt)
    }

    pub fn claim_refund(&mut self, caller: &Address, event: &Address) -> Result<Receipt, ExchangeError> {
        let now = self.tick();
        let state = &mut self.state;
        let receipt = state.registry.claim_refund(&mut state.events, caller, event, now)?;
        self.audit(event);
        Ok(receipt)
    }
}
