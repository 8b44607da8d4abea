//! Partitioned free-balance ledger.
//!
//! The clearing engine consumes the ledger through the narrow [`Ledger`]
//! trait: read free/frozen balances, debit and credit free balance, burn
//! supply. [`InMemoryLedger`] is the reference implementation: per
//! (partition, account) free and frozen buckets stored as
//! [`ScaledAmount`]s and rescaled lazily on read.
//!
//! Every method receives the factor current for the partition; the ledger
//! itself never looks at the adjustment registry. All mutations are atomic:
//! either the full operation succeeds or the balance is unchanged.

use std::collections::HashMap;

use tokenclear_types::{
    AccountId, AdjustmentFactor, Amount, ClearingError, Partition, Result, ScaledAmount,
};

use crate::supply::SupplyTracker;

/// Free-balance primitives the clearing engine depends on.
pub trait Ledger {
    /// Adjusted spendable balance.
    fn free_balance(
        &self,
        partition: Partition,
        account: AccountId,
        factor: AdjustmentFactor,
    ) -> Result<Amount>;

    /// Adjusted administratively frozen balance.
    fn frozen_balance(
        &self,
        partition: Partition,
        account: AccountId,
        factor: AdjustmentFactor,
    ) -> Result<Amount>;

    /// Remove `amount` from the free balance.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if the adjusted free balance is smaller.
    fn debit_free(
        &mut self,
        partition: Partition,
        account: AccountId,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()>;

    /// Add `amount` to the free balance. Does not change supply.
    fn credit_free(
        &mut self,
        partition: Partition,
        account: AccountId,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()>;

    /// Reduce the partition's total supply by tokens already removed from
    /// every balance bucket.
    fn burn(&mut self, partition: Partition, amount: Amount, factor: AdjustmentFactor) -> Result<()>;

    /// Adjusted total supply of the partition.
    fn total_supply(&self, partition: Partition, factor: AdjustmentFactor) -> Result<Amount>;

    /// Every account with a balance entry on the partition.
    fn accounts(&self, partition: Partition) -> Vec<AccountId>;

    /// Every partition the account has a balance entry on.
    fn partitions_of(&self, account: AccountId) -> Vec<Partition>;
}

/// Stored buckets for one (partition, account).
#[derive(Debug, Clone, Copy, Default)]
struct LedgerEntry {
    free: ScaledAmount,
    frozen: ScaledAmount,
}

/// In-memory [`Ledger`] with issuance and freeze support.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    /// Per-(partition, account) buckets.
    balances: HashMap<(Partition, AccountId), LedgerEntry>,
    /// Issuance and burn totals.
    supply: SupplyTracker,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` into the account's free balance.
    pub fn issue(
        &mut self,
        partition: Partition,
        account: AccountId,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()> {
        let mut entry = self.entry(partition, account);
        entry.free.add(amount, factor)?;
        self.supply.record_issue(partition, amount, factor)?;
        self.balances.insert((partition, account), entry);
        Ok(())
    }

    /// Move free → frozen.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if free < amount.
    pub fn freeze(
        &mut self,
        partition: Partition,
        account: AccountId,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()> {
        let mut entry = self.entry(partition, account);
        entry.free.sub(amount, factor)?;
        entry.frozen.add(amount, factor)?;
        self.balances.insert((partition, account), entry);
        Ok(())
    }

    /// Move frozen → free.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if frozen < amount.
    pub fn unfreeze(
        &mut self,
        partition: Partition,
        account: AccountId,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()> {
        let mut entry = self.entry(partition, account);
        entry.frozen.sub(amount, factor)?;
        entry.free.add(amount, factor)?;
        self.balances.insert((partition, account), entry);
        Ok(())
    }

    fn entry(&self, partition: Partition, account: AccountId) -> LedgerEntry {
        self.balances
            .get(&(partition, account))
            .copied()
            .unwrap_or_default()
    }
}

impl Ledger for InMemoryLedger {
    fn free_balance(
        &self,
        partition: Partition,
        account: AccountId,
        factor: AdjustmentFactor,
    ) -> Result<Amount> {
        self.entry(partition, account).free.adjusted(factor)
    }

    fn frozen_balance(
        &self,
        partition: Partition,
        account: AccountId,
        factor: AdjustmentFactor,
    ) -> Result<Amount> {
        self.entry(partition, account).frozen.adjusted(factor)
    }

    fn debit_free(
        &mut self,
        partition: Partition,
        account: AccountId,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()> {
        let mut entry = self.entry(partition, account);
        entry.free.sub(amount, factor)?;
        self.balances.insert((partition, account), entry);
        Ok(())
    }

    fn credit_free(
        &mut self,
        partition: Partition,
        account: AccountId,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()> {
        let mut entry = self.entry(partition, account);
        entry.free.add(amount, factor)?;
        self.balances.insert((partition, account), entry);
        Ok(())
    }

    fn burn(&mut self, partition: Partition, amount: Amount, factor: AdjustmentFactor) -> Result<()> {
        self.supply.record_burn(partition, amount, factor)
    }

    fn total_supply(&self, partition: Partition, factor: AdjustmentFactor) -> Result<Amount> {
        self.supply.expected_supply(partition, factor)
    }

    fn accounts(&self, partition: Partition) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self
            .balances
            .keys()
            .filter(|(p, _)| *p == partition)
            .map(|(_, account)| *account)
            .collect();
        accounts.sort_unstable();
        accounts
    }

    fn partitions_of(&self, account: AccountId) -> Vec<Partition> {
        let mut partitions: Vec<Partition> = self
            .balances
            .keys()
            .filter(|(_, a)| *a == account)
            .map(|(partition, _)| *partition)
            .collect();
        partitions.sort_unstable();
        partitions
    }
}

/// Sum of adjusted free + frozen across every account on the partition.
pub fn ledger_held_supply<L: Ledger + ?Sized>(
    ledger: &L,
    partition: Partition,
    factor: AdjustmentFactor,
) -> Result<Amount> {
    ledger
        .accounts(partition)
        .into_iter()
        .try_fold(0u128, |sum, account| {
            let free = ledger.free_balance(partition, account, factor)?;
            let frozen = ledger.frozen_balance(partition, account, factor)?;
            sum.checked_add(free)
                .and_then(|s| s.checked_add(frozen))
                .ok_or(ClearingError::ArithmeticOverflow)
        })
}
