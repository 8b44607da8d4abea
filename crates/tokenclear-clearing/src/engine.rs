//! Clearing engine: state, mode, adjustments and read surface.
//!
//! [`ClearingEngine`] owns the pending store, the cleared aggregates and the
//! balance adjustment registry, and drives the external collaborators
//! ([`Ledger`], [`GuardChain`], [`HoldBridge`], [`Clock`]). The creation
//! entry points live in `create.rs`, settlement in `settle.rs`.
//!
//! ## Atomicity
//!
//! Every mutating call runs in three phases:
//! 1. **Checks**: guard chain, validation, balances. Nothing is written.
//! 2. **Fallible internal math**: new aggregates are computed, not stored.
//! 3. **Commit**: external mutations first, then internal writes that
//!    cannot fail.
//!
//! A failure in phase 1 or 2 leaves every component untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokenclear_ledger::{BalanceAdjustmentRegistry, InMemoryLedger, Ledger, ledger_held_supply};
use tokenclear_types::{
    AccountId, AdjustmentFactor, AdjustmentStep, Amount, ClearingError, ClearingEvent, ClearingId,
    ClearingIdentifier, ClearingKind, ClearingOperationType, ClearingRecord, EngineConfig, Partition,
    PartitionBalance, Result, Role, ScaledAmount,
};

use crate::clock::Clock;
use crate::guard::GuardChain;
use crate::hold_bridge::HoldBridge;
use crate::store::ClearingStore;

/// Clearing lifecycle controller for one token ledger.
pub struct ClearingEngine<L, G, H, C> {
    pub(crate) config: EngineConfig,
    pub(crate) clearing_active: bool,
    pub(crate) registry: BalanceAdjustmentRegistry,
    pub(crate) store: ClearingStore,
    /// Cleared totals: holder → partition → amount.
    pub(crate) cleared: BTreeMap<AccountId, BTreeMap<Partition, ScaledAmount>>,
    pub(crate) ledger: L,
    pub(crate) guard: G,
    pub(crate) holds: H,
    pub(crate) clock: C,
    pub(crate) events: Vec<ClearingEvent>,
}

impl<L, G, H, C> ClearingEngine<L, G, H, C>
where
    L: Ledger,
    G: GuardChain,
    H: HoldBridge,
    C: Clock,
{
    /// Build an engine around its collaborators.
    ///
    /// # Errors
    /// Returns [`ClearingError::Configuration`] if `config` is invalid.
    pub fn new(config: EngineConfig, ledger: L, guard: G, holds: H, clock: C) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            multi_partition = config.multi_partition,
            clearing_active = config.clearing_active,
            base_decimals = config.base_decimals,
            "Clearing engine initialized"
        );
        Ok(Self {
            clearing_active: config.clearing_active,
            config,
            registry: BalanceAdjustmentRegistry::new(),
            store: ClearingStore::new(),
            cleared: BTreeMap::new(),
            ledger,
            guard,
            holds,
            clock,
            events: Vec::new(),
        })
    }

    // -----------------------------------------------------------------
    // Clearing mode
    // -----------------------------------------------------------------

    /// Switch clearing mode on. Requires [`Role::Clearing`].
    pub fn activate_clearing(&mut self, caller: AccountId) -> Result<()> {
        self.set_clearing_mode(caller, true)
    }

    /// Switch clearing mode off. Pending clearings stay pending but cannot
    /// be created, approved, cancelled or reclaimed until reactivation.
    pub fn deactivate_clearing(&mut self, caller: AccountId) -> Result<()> {
        self.set_clearing_mode(caller, false)
    }

    #[must_use]
    pub fn is_clearing_activated(&self) -> bool {
        self.clearing_active
    }

    fn set_clearing_mode(&mut self, caller: AccountId, active: bool) -> Result<()> {
        self.guard.check_not_paused()?;
        self.guard.check_role(Role::Clearing, caller)?;
        self.clearing_active = active;
        let event = if active {
            ClearingEvent::ClearingActivated { operator: caller }
        } else {
            ClearingEvent::ClearingDeactivated { operator: caller }
        };
        tracing::info!(operator = %caller, active, "Clearing mode changed");
        self.events.push(event);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Balance adjustments
    // -----------------------------------------------------------------

    /// Apply `step` to every partition. Requires [`Role::AdjustmentBalance`].
    pub fn adjust_balances(&mut self, caller: AccountId, step: AdjustmentStep) -> Result<AdjustmentFactor> {
        self.guard.check_not_paused()?;
        self.guard.check_role(Role::AdjustmentBalance, caller)?;
        let step = AdjustmentStep::new(step.factor, step.decimals)?;
        let now = self.clock.now();
        let due = self.registry.due_adjustments(now)?;
        let factor = due
            .last()
            .map_or(self.registry.global_factor(), |(_, factor)| *factor)
            .apply(step)?;

        self.commit_scheduled(caller, now, due);
        self.registry.apply_adjustment(step)?;
        tracing::info!(operator = %caller, %step, %factor, "Balances adjusted");
        self.events.push(ClearingEvent::BalancesAdjusted {
            operator: caller,
            partition: None,
            step,
            factor,
        });
        Ok(factor)
    }

    /// Apply `step` to one partition only.
    pub fn adjust_balances_by_partition(
        &mut self,
        caller: AccountId,
        partition: Partition,
        step: AdjustmentStep,
    ) -> Result<AdjustmentFactor> {
        self.guard.check_not_paused()?;
        self.guard.check_role(Role::AdjustmentBalance, caller)?;
        self.check_partition(partition)?;
        let step = AdjustmentStep::new(step.factor, step.decimals)?;
        let now = self.clock.now();
        let due = self.registry.due_adjustments(now)?;
        let factor = self.registry.factor_at(partition, now)?.apply(step)?;

        self.commit_scheduled(caller, now, due);
        self.registry.apply_partition_adjustment(partition, step)?;
        tracing::info!(
            operator = %caller,
            partition = %partition.short(),
            %step,
            %factor,
            "Partition balances adjusted"
        );
        self.events.push(ClearingEvent::BalancesAdjusted {
            operator: caller,
            partition: Some(partition),
            step,
            factor,
        });
        Ok(factor)
    }

    /// Queue a global adjustment for `execution_time`, which must be in the
    /// future. It takes effect for reads as soon as it is due and is folded
    /// into the registry by the next write.
    pub fn schedule_balance_adjustment(
        &mut self,
        caller: AccountId,
        execution_time: DateTime<Utc>,
        step: AdjustmentStep,
    ) -> Result<()> {
        self.guard.check_not_paused()?;
        self.guard.check_role(Role::AdjustmentBalance, caller)?;
        let now = self.clock.now();
        if execution_time <= now {
            return Err(ClearingError::WrongExpirationTimestamp {
                expiration: execution_time,
                now,
            });
        }
        self.registry.schedule(execution_time, step)?;
        tracing::info!(operator = %caller, %execution_time, %step, "Balance adjustment scheduled");
        self.events.push(ClearingEvent::BalanceAdjustmentScheduled {
            operator: caller,
            execution_time,
            step,
        });
        Ok(())
    }

    /// Scheduled adjustments not yet folded into the registry.
    #[must_use]
    pub fn pending_adjustments(&self) -> Vec<(DateTime<Utc>, AdjustmentStep)> {
        self.registry.pending()
    }

    /// Effective adjustment factor of `partition` right now.
    pub fn current_factor(&self, partition: Partition) -> Result<AdjustmentFactor> {
        self.registry.factor_at(partition, self.clock.now())
    }

    // -----------------------------------------------------------------
    // Reads: cleared amounts and records
    // -----------------------------------------------------------------

    /// Adjusted amount locked by pending clearings of `holder` on `partition`.
    pub fn cleared_amount_for_by_partition(&self, partition: Partition, holder: AccountId) -> Result<Amount> {
        let factor = self.current_factor(partition)?;
        self.cleared_entry(partition, holder).adjusted(factor)
    }

    /// Stored cleared amount, at the scale it was last written.
    #[must_use]
    pub fn cleared_amount_for_by_partition_unadjusted(&self, partition: Partition, holder: AccountId) -> Amount {
        self.cleared_entry(partition, holder).raw
    }

    /// Adjusted cleared amount of `holder` across every partition.
    pub fn cleared_amount_for(&self, holder: AccountId) -> Result<Amount> {
        self.cleared
            .get(&holder)
            .into_iter()
            .flatten()
            .try_fold(0u128, |sum, (partition, amount)| {
                let adjusted = amount.adjusted(self.current_factor(*partition)?)?;
                sum.checked_add(adjusted).ok_or(ClearingError::ArithmeticOverflow)
            })
    }

    /// Sum of stored cleared amounts of `holder` across every partition.
    pub fn cleared_amount_for_unadjusted(&self, holder: AccountId) -> Result<Amount> {
        self.cleared
            .get(&holder)
            .into_iter()
            .flatten()
            .try_fold(0u128, |sum, (_, amount)| {
                sum.checked_add(amount.raw).ok_or(ClearingError::ArithmeticOverflow)
            })
    }

    /// A pending clearing with its amounts rescaled to the current factor.
    ///
    /// # Errors
    /// Returns [`ClearingError::WrongClearingId`] if no record matches.
    pub fn clearing_for_by_partition(&self, id: &ClearingIdentifier) -> Result<ClearingRecord> {
        let record = self.store.get(id)?;
        record.adjusted(self.current_factor(id.partition)?)
    }

    /// A pending clearing exactly as stored.
    pub fn clearing_for_by_partition_unadjusted(&self, id: &ClearingIdentifier) -> Result<ClearingRecord> {
        self.store.get(id).cloned()
    }

    #[must_use]
    pub fn clearing_count_for_by_partition(
        &self,
        partition: Partition,
        holder: AccountId,
        operation_type: ClearingOperationType,
    ) -> usize {
        self.store.count_by_type(partition, holder, operation_type)
    }

    /// One page of pending clearing ids. `limit` is capped at the
    /// configured page size.
    #[must_use]
    pub fn clearings_id_for_by_partition(
        &self,
        partition: Partition,
        holder: AccountId,
        operation_type: ClearingOperationType,
        offset: usize,
        limit: usize,
    ) -> Vec<ClearingId> {
        let limit = limit.min(self.config.max_page_size);
        self.store
            .list_by_type(partition, holder, operation_type, offset, limit)
    }

    // -----------------------------------------------------------------
    // Reads: balances and supply
    // -----------------------------------------------------------------

    /// Adjusted free balance.
    pub fn balance_of_by_partition(&self, partition: Partition, account: AccountId) -> Result<Amount> {
        let factor = self.current_factor(partition)?;
        self.ledger.free_balance(partition, account, factor)
    }

    /// Adjusted free balance across every partition.
    pub fn balance_of(&self, account: AccountId) -> Result<Amount> {
        self.ledger
            .partitions_of(account)
            .into_iter()
            .try_fold(0u128, |sum, partition| {
                let free = self.balance_of_by_partition(partition, account)?;
                sum.checked_add(free).ok_or(ClearingError::ArithmeticOverflow)
            })
    }

    /// Adjusted free, cleared, held and frozen buckets.
    pub fn partition_balance(&self, partition: Partition, account: AccountId) -> Result<PartitionBalance> {
        let factor = self.current_factor(partition)?;
        Ok(PartitionBalance {
            free: self.ledger.free_balance(partition, account, factor)?,
            cleared: self.cleared_entry(partition, account).adjusted(factor)?,
            held: self.holds.held_amount(partition, account, factor)?,
            frozen: self.ledger.frozen_balance(partition, account, factor)?,
        })
    }

    /// Adjusted free + frozen + cleared + held.
    pub fn total_balance_for_by_partition(&self, partition: Partition, account: AccountId) -> Result<Amount> {
        self.partition_balance(partition, account)?.total()
    }

    /// Adjusted total supply of `partition`.
    pub fn total_supply_by_partition(&self, partition: Partition) -> Result<Amount> {
        let factor = self.current_factor(partition)?;
        self.ledger.total_supply(partition, factor)
    }

    /// Token decimals on `partition`: base decimals plus every applied shift.
    pub fn decimals(&self, partition: Partition) -> Result<u32> {
        self.config
            .base_decimals
            .checked_add(self.current_factor(partition)?.decimals)
            .ok_or(ClearingError::ArithmeticOverflow)
    }

    /// Render a raw amount on `partition` in display units.
    ///
    /// # Errors
    /// Returns [`ClearingError::ArithmeticOverflow`] if the amount or the
    /// decimals exceed what [`Decimal`] can represent.
    pub fn display_amount(&self, partition: Partition, amount: Amount) -> Result<Decimal> {
        let scale = self.decimals(partition)?;
        let mantissa = i128::try_from(amount).map_err(|_| ClearingError::ArithmeticOverflow)?;
        Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|_| ClearingError::ArithmeticOverflow)
    }

    /// Check that the balances of every account on `partition` add up to
    /// its supply.
    ///
    /// ```text
    /// Σ(free + frozen) + Σ(cleared) + Σ(held) == issued - burned
    /// ```
    ///
    /// # Errors
    /// Returns [`ClearingError::SupplyInvariantViolation`] on mismatch.
    pub fn verify_conservation(&self, partition: Partition) -> Result<()> {
        let factor = self.current_factor(partition)?;
        let ledger_side = ledger_held_supply(&self.ledger, partition, factor)?;
        let cleared = self
            .cleared
            .values()
            .filter_map(|by_partition| by_partition.get(&partition))
            .try_fold(0u128, |sum, amount| {
                sum.checked_add(amount.adjusted(factor)?)
                    .ok_or(ClearingError::ArithmeticOverflow)
            })?;
        let held = self
            .ledger
            .accounts(partition)
            .into_iter()
            .try_fold(0u128, |sum, account| {
                sum.checked_add(self.holds.held_amount(partition, account, factor)?)
                    .ok_or(ClearingError::ArithmeticOverflow)
            })?;

        let actual = [cleared, held]
            .into_iter()
            .try_fold(ledger_side, Amount::checked_add)
            .ok_or(ClearingError::ArithmeticOverflow)?;
        let expected = self.ledger.total_supply(partition, factor)?;
        if actual != expected {
            tracing::warn!(
                partition = %partition.short(),
                actual,
                expected,
                "Supply conservation violated"
            );
            return Err(ClearingError::SupplyInvariantViolation {
                reason: format!(
                    "{partition}: balances {actual} (ledger={ledger_side}, cleared={cleared}, \
                     held={held}) != supply {expected}"
                ),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Events and collaborators
    // -----------------------------------------------------------------

    /// Drain the events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<ClearingEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn events(&self) -> &[ClearingEvent] {
        &self.events
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    #[must_use]
    pub fn guard(&self) -> &G {
        &self.guard
    }

    pub fn guard_mut(&mut self) -> &mut G {
        &mut self.guard
    }

    #[must_use]
    pub fn holds(&self) -> &H {
        &self.holds
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Total pending clearings across every holder and partition.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.store.len()
    }

    // -----------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------

    /// Partition key validity for the configured partition mode.
    pub(crate) fn check_partition(&self, partition: Partition) -> Result<()> {
        if partition.is_zero() {
            return Err(ClearingError::InvalidPartition(partition));
        }
        if !self.config.multi_partition && !partition.is_default() {
            return Err(ClearingError::PartitionNotAllowedInSinglePartitionMode(partition));
        }
        Ok(())
    }

    pub(crate) fn check_active(&self) -> Result<()> {
        if self.clearing_active {
            Ok(())
        } else {
            Err(ClearingError::ClearingIsDisabled)
        }
    }

    pub(crate) fn cleared_entry(&self, partition: Partition, holder: AccountId) -> ScaledAmount {
        self.cleared
            .get(&holder)
            .and_then(|by_partition| by_partition.get(&partition))
            .copied()
            .unwrap_or_default()
    }

    /// Store a cleared total computed in the checks phase. Zero entries are
    /// dropped.
    pub(crate) fn set_cleared(&mut self, partition: Partition, holder: AccountId, amount: ScaledAmount) {
        if amount.is_zero() {
            if let Some(by_partition) = self.cleared.get_mut(&holder) {
                by_partition.remove(&partition);
                if by_partition.is_empty() {
                    self.cleared.remove(&holder);
                }
            }
            return;
        }
        self.cleared.entry(holder).or_default().insert(partition, amount);
    }

    /// Control list and KYC of the holder and of the receiving account (a
    /// transfer destination or a hold's `to`), then compliance of the
    /// equivalent free movement. Creation and approval check the same set.
    pub(crate) fn check_parties(
        &self,
        partition: Partition,
        holder: AccountId,
        kind: &ClearingKind,
        amount: Amount,
    ) -> Result<()> {
        let receiver = kind.destination();
        for account in std::iter::once(holder).chain(receiver) {
            self.guard.check_not_control_listed(account)?;
        }
        for account in std::iter::once(holder).chain(receiver) {
            self.guard.check_kyc(account)?;
        }
        self.guard.check_compliance(partition, holder, receiver, amount)
    }

    /// Fold scheduled adjustments planned by
    /// [`BalanceAdjustmentRegistry::due_adjustments`] into the registry.
    /// Runs after the last fallible step of a write.
    pub(crate) fn commit_scheduled(
        &mut self,
        operator: AccountId,
        now: DateTime<Utc>,
        due: Vec<(AdjustmentStep, AdjustmentFactor)>,
    ) {
        self.registry.commit_due(now, &due);
        self.events
            .extend(due.into_iter().map(|(step, factor)| ClearingEvent::BalancesAdjusted {
                operator,
                partition: None,
                step,
                factor,
            }));
    }
}

impl<G, H, C> ClearingEngine<InMemoryLedger, G, H, C>
where
    G: GuardChain,
    H: HoldBridge,
    C: Clock,
{
    /// Mint `amount` (at the current scale) into the free balance of
    /// `account`.
    pub fn issue(&mut self, partition: Partition, account: AccountId, amount: Amount) -> Result<()> {
        self.check_partition(partition)?;
        if account.is_zero() {
            return Err(ClearingError::ZeroAddressNotAllowed);
        }
        let factor = self.current_factor(partition)?;
        self.ledger.issue(partition, account, amount, factor)?;
        tracing::debug!(partition = %partition.short(), %account, amount, "Tokens issued");
        Ok(())
    }

    /// Move `amount` of `account`'s free balance into its frozen bucket.
    pub fn freeze(&mut self, partition: Partition, account: AccountId, amount: Amount) -> Result<()> {
        let factor = self.current_factor(partition)?;
        self.ledger.freeze(partition, account, amount, factor)
    }
}
