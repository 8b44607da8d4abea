//! Clearing resolution: approve, cancel, reclaim.
//!
//! Every path rescales the principal from its creation factor to the
//! current one before moving tokens, so a balance adjustment applied while
//! the clearing was pending is honoured exactly once.
//!
//! | Path    | Guard re-check | Tokens go to                 | Outcome     |
//! |---------|----------------|------------------------------|-------------|
//! | approve | yes            | destination / burn / hold    | `Settled`   |
//! | cancel  | no             | holder's free balance        | `Cancelled` |
//! | reclaim | no             | holder's free balance        | `Reclaimed` |

use tokenclear_ledger::Ledger;
use tokenclear_types::{
    AccountId, Amount, ClearingError, ClearingEvent, ClearingIdentifier, ClearingKind,
    ClearingOutcome, HoldId, Result, Role,
};

use crate::clock::Clock;
use crate::engine::ClearingEngine;
use crate::guard::GuardChain;
use crate::hold_bridge::HoldBridge;

impl<L, G, H, C> ClearingEngine<L, G, H, C>
where
    L: Ledger,
    G: GuardChain,
    H: HoldBridge,
    C: Clock,
{
    /// Execute a pending clearing. Requires [`Role::ClearingValidator`].
    ///
    /// Control list, KYC and compliance are evaluated again against the
    /// current state. Returns the id of the created hold for HoldCreation
    /// clearings.
    ///
    /// # Errors
    /// - [`ClearingError::WrongClearingId`] if no record matches `id`
    /// - any guard-chain error if the holder or destination is no longer
    ///   eligible; the clearing stays pending
    pub fn approve_clearing_operation_by_partition(
        &mut self,
        caller: AccountId,
        id: &ClearingIdentifier,
    ) -> Result<Option<HoldId>> {
        self.guard.check_not_paused()?;
        self.check_active()?;
        self.guard.check_role(Role::ClearingValidator, caller)?;
        let stored = self.store.get(id)?;

        let now = self.clock.now();
        let factor = self.registry.factor_at(id.partition, now)?;
        let record = stored.adjusted(factor)?;
        let settle = record.header.amount;
        self.check_parties(id.partition, record.header.token_holder, &record.kind, settle)
            .inspect_err(|err| {
                tracing::warn!(clearing = %id, error = %err, "Clearing approval blocked by guard chain");
            })?;

        let holder = record.header.token_holder;
        let mut cleared = self.cleared_entry(id.partition, holder);
        cleared.sub(settle, factor)?;
        let due = self.registry.due_adjustments(now)?;

        // Commit.
        let created = match record.kind {
            ClearingKind::Transfer { destination } => {
                self.ledger
                    .credit_free(id.partition, destination, settle, factor)?;
                None
            }
            ClearingKind::Redeem => {
                self.ledger.burn(id.partition, settle, factor)?;
                None
            }
            ClearingKind::HoldCreation(hold) => Some(
                self.holds
                    .create_hold(id.partition, holder, hold, factor)?,
            ),
        };
        self.store.remove(id)?;
        self.commit_scheduled(caller, now, due);
        self.set_cleared(id.partition, holder, cleared);

        tracing::info!(clearing = %id, operator = %caller, amount = settle, "Clearing approved");
        self.events.push(ClearingEvent::ClearingResolved {
            operator: caller,
            identifier: *id,
            outcome: ClearingOutcome::Settled,
            amount: settle,
        });
        Ok(created.map(|hold| {
            let hold_id = hold.hold_id;
            self.events.push(ClearingEvent::HoldCreated {
                token_holder: hold.token_holder,
                partition: hold.partition,
                hold_id,
                escrow: hold.escrow,
                amount: hold.amount,
            });
            hold_id
        }))
    }

    /// Abort a pending clearing and refund the holder. Requires
    /// [`Role::ClearingValidator`]. Returns the refunded amount.
    pub fn cancel_clearing_operation_by_partition(
        &mut self,
        caller: AccountId,
        id: &ClearingIdentifier,
    ) -> Result<Amount> {
        self.release(caller, id, ClearingOutcome::Cancelled)
    }

    /// Refund an expired pending clearing to the holder.
    ///
    /// # Errors
    /// Returns [`ClearingError::ClearingNotExpired`] unless the clock is
    /// strictly past the clearing's expiration.
    pub fn reclaim_clearing_operation_by_partition(
        &mut self,
        caller: AccountId,
        id: &ClearingIdentifier,
    ) -> Result<Amount> {
        self.release(caller, id, ClearingOutcome::Reclaimed)
    }

    /// Shared cancel/reclaim path: no guard re-check, refund to free balance.
    fn release(
        &mut self,
        caller: AccountId,
        id: &ClearingIdentifier,
        outcome: ClearingOutcome,
    ) -> Result<Amount> {
        self.guard.check_not_paused()?;
        self.check_active()?;
        self.guard.check_role(Role::ClearingValidator, caller)?;
        let record = self.store.get(id)?;

        let now = self.clock.now();
        if outcome == ClearingOutcome::Reclaimed && !record.is_expired(now) {
            return Err(ClearingError::ClearingNotExpired {
                clearing_id: id.clearing_id,
                expiration: record.header.expiration,
            });
        }
        let factor = self.registry.factor_at(id.partition, now)?;
        let refund = factor.rescale(record.header.amount, record.header.creation_factor)?;
        let holder = record.header.token_holder;
        let mut cleared = self.cleared_entry(id.partition, holder);
        cleared.sub(refund, factor)?;
        let due = self.registry.due_adjustments(now)?;

        // Commit.
        self.ledger
            .credit_free(id.partition, holder, refund, factor)?;
        self.store.remove(id)?;
        self.commit_scheduled(caller, now, due);
        self.set_cleared(id.partition, holder, cleared);

        tracing::info!(clearing = %id, operator = %caller, amount = refund, %outcome, "Clearing released");
        self.events.push(ClearingEvent::ClearingResolved {
            operator: caller,
            identifier: *id,
            outcome,
            amount: refund,
        });
        Ok(refund)
    }
}
