//! Issuance and burn totals backing the ledger's supply figure.
//!
//! The engine's conservation check holds, per partition, under the current
//! factor:
//! ```text
//! Σ(free + cleared + held + frozen) == Σ(issued) - Σ(burned)
//! ```
//!
//! Issuance and burns are stored as [`ScaledAmount`]s so the expected supply
//! follows balance adjustments exactly like the balances it is compared to.

use std::collections::HashMap;

use tokenclear_types::{
    AdjustmentFactor, Amount, ClearingError, Partition, Result, ScaledAmount,
};

/// Tracks per-partition issuance and burns.
#[derive(Debug, Default)]
pub struct SupplyTracker {
    /// Total issued per partition since genesis.
    issued: HashMap<Partition, ScaledAmount>,
    /// Total burned per partition since genesis.
    burned: HashMap<Partition, ScaledAmount>,
}

impl SupplyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issuance.
    pub fn record_issue(
        &mut self,
        partition: Partition,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()> {
        self.issued
            .entry(partition)
            .or_insert_with(|| ScaledAmount::new(0, factor))
            .add(amount, factor)
    }

    /// Record a burn. Fails without change if it exceeds the supply.
    pub fn record_burn(
        &mut self,
        partition: Partition,
        amount: Amount,
        factor: AdjustmentFactor,
    ) -> Result<()> {
        let supply = self.expected_supply(partition, factor)?;
        if amount > supply {
            return Err(ClearingError::InsufficientBalance {
                needed: amount,
                available: supply,
            });
        }
        self.burned
            .entry(partition)
            .or_insert_with(|| ScaledAmount::new(0, factor))
            .add(amount, factor)
    }

    /// Expected supply for a partition: issued - burned, adjusted.
    pub fn expected_supply(&self, partition: Partition, factor: AdjustmentFactor) -> Result<Amount> {
        let issued = self.total_issued(partition, factor)?;
        let burned = self.total_burned(partition, factor)?;
        issued.checked_sub(burned).ok_or_else(|| {
            ClearingError::SupplyInvariantViolation {
                reason: format!("{partition}: burned {burned} exceeds issued {issued}"),
            }
        })
    }

    pub fn total_issued(&self, partition: Partition, factor: AdjustmentFactor) -> Result<Amount> {
        self.issued
            .get(&partition)
            .map_or(Ok(0), |issued| issued.adjusted(factor))
    }

    pub fn total_burned(&self, partition: Partition, factor: AdjustmentFactor) -> Result<Amount> {
        self.burned
            .get(&partition)
            .map_or(Ok(0), |burned| burned.adjusted(factor))
    }
}
