// Shared exchange handle - serialized writers, concurrent readers

use crate::clock::Clock;
use crate::exchange::facade::TicketExchange;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cloneable handle over one [`TicketExchange`].
///
/// Writers run one at a time, so each operation sees and leaves a fully
/// committed state; readers never observe a half-applied operation.
pub struct SharedExchange<C: Clock> {
    inner: Arc<RwLock<TicketExchange<C>>>,
}

impl<C: Clock> Clone for SharedExchange<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> SharedExchange<C> {
    pub fn new(exchange: TicketExchange<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(exchange)),
        }
    }

    /// Read committed state
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&TicketExchange<C>) -> T,
    {
        let exchange = self.inner.read().await;
        f(&exchange)
    }

    /// Run one operation with exclusive access
    pub async fn apply<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut TicketExchange<C>) -> T,
    {
        let mut exchange = self.inner.write().await;
        f(&mut exchange)
    }

    /// Take the exchange back once every other handle is gone
    pub fn try_unwrap(self) -> Result<TicketExchange<C>, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}
