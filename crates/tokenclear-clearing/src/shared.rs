//! Thread-safe handle around a [`ClearingEngine`].
//!
//! One global `RwLock` serializes every mutating call; reads share the
//! lock. A call runs to completion under the lock, so concurrent callers
//! observe the same atomicity as a single-threaded host.

use std::sync::Arc;

use parking_lot::RwLock;
use tokenclear_ledger::Ledger;
use tokenclear_types::{
    AccountId, Amount, ClearingEvent, ClearingId, ClearingIdentifier, ClearingOperation, HoldId,
    Partition, Result,
};

use crate::clock::Clock;
use crate::engine::ClearingEngine;
use crate::guard::GuardChain;
use crate::hold_bridge::HoldBridge;

/// Cloneable, lock-protected engine handle.
pub struct SharedClearingEngine<L, G, H, C> {
    inner: Arc<RwLock<ClearingEngine<L, G, H, C>>>,
}

impl<L, G, H, C> Clone for SharedClearingEngine<L, G, H, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, G, H, C> SharedClearingEngine<L, G, H, C>
where
    L: Ledger,
    G: GuardChain,
    H: HoldBridge,
    C: Clock,
{
    #[must_use]
    pub fn new(engine: ClearingEngine<L, G, H, C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Run `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&ClearingEngine<L, G, H, C>) -> R) -> R {
        f(&*self.inner.read())
    }

    /// Run `f` under the write lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut ClearingEngine<L, G, H, C>) -> R) -> R {
        f(&mut *self.inner.write())
    }

    pub fn clearing_transfer_by_partition(
        &self,
        caller: AccountId,
        operation: ClearingOperation,
        amount: Amount,
        to: AccountId,
    ) -> Result<ClearingId> {
        self.inner
            .write()
            .clearing_transfer_by_partition(caller, operation, amount, to)
    }

    pub fn approve_clearing_operation_by_partition(
        &self,
        caller: AccountId,
        id: &ClearingIdentifier,
    ) -> Result<Option<HoldId>> {
        self.inner
            .write()
            .approve_clearing_operation_by_partition(caller, id)
    }

    pub fn cancel_clearing_operation_by_partition(
        &self,
        caller: AccountId,
        id: &ClearingIdentifier,
    ) -> Result<Amount> {
        self.inner
            .write()
            .cancel_clearing_operation_by_partition(caller, id)
    }

    pub fn balance_of_by_partition(&self, partition: Partition, account: AccountId) -> Result<Amount> {
        self.inner.read().balance_of_by_partition(partition, account)
    }

    pub fn cleared_amount_for_by_partition(&self, partition: Partition, holder: AccountId) -> Result<Amount> {
        self.inner
            .read()
            .cleared_amount_for_by_partition(partition, holder)
    }

    pub fn verify_conservation(&self, partition: Partition) -> Result<()> {
        self.inner.read().verify_conservation(partition)
    }

    #[must_use]
    pub fn is_clearing_activated(&self) -> bool {
        self.inner.read().is_clearing_activated()
    }

    pub fn take_events(&self) -> Vec<ClearingEvent> {
        self.inner.write().take_events()
    }
}
