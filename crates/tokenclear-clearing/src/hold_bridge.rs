//! Hold bridge: materializes escrow holds from approved clearings.
//!
//! Only the creation entry point of the hold subsystem is consumed here;
//! executing or releasing a hold is the hold subsystem's business.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokenclear_types::{
    AccountId, AdjustmentFactor, Amount, ClearingError, Hold, HoldId, Partition, Result,
    ScaledAmount,
};

/// What the hold subsystem reports after creating a hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldCreated {
    pub partition: Partition,
    pub token_holder: AccountId,
    pub hold_id: HoldId,
    pub escrow: AccountId,
    pub amount: Amount,
}

/// Creation entry point of the hold subsystem.
pub trait HoldBridge {
    /// Lock `hold.amount` (already adjusted to `factor`) for `holder`.
    fn create_hold(
        &mut self,
        partition: Partition,
        holder: AccountId,
        hold: Hold,
        factor: AdjustmentFactor,
    ) -> Result<HoldCreated>;

    /// Adjusted total held for (partition, holder).
    fn held_amount(
        &self,
        partition: Partition,
        holder: AccountId,
        factor: AdjustmentFactor,
    ) -> Result<Amount>;
}

/// A hold as stored by [`InMemoryHoldBridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHold {
    pub hold: Hold,
    pub amount: ScaledAmount,
}

/// In-memory [`HoldBridge`].
#[derive(Debug, Default)]
pub struct InMemoryHoldBridge {
    holds: HashMap<(Partition, AccountId, HoldId), StoredHold>,
    totals: HashMap<(Partition, AccountId), ScaledAmount>,
    counters: HashMap<(Partition, AccountId), u64>,
}

impl InMemoryHoldBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, partition: Partition, holder: AccountId, hold_id: HoldId) -> Option<&StoredHold> {
        self.holds.get(&(partition, holder, hold_id))
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.holds.len()
    }
}

impl HoldBridge for InMemoryHoldBridge {
    fn create_hold(
        &mut self,
        partition: Partition,
        holder: AccountId,
        hold: Hold,
        factor: AdjustmentFactor,
    ) -> Result<HoldCreated> {
        if hold.escrow.is_zero() {
            return Err(ClearingError::ZeroAddressNotAllowed);
        }
        let mut total = self
            .totals
            .get(&(partition, holder))
            .copied()
            .unwrap_or_default();
        total.add(hold.amount, factor)?;

        let counter = self.counters.entry((partition, holder)).or_insert(0);
        *counter += 1;
        let hold_id = HoldId(*counter);

        let created = HoldCreated {
            partition,
            token_holder: holder,
            hold_id,
            escrow: hold.escrow,
            amount: hold.amount,
        };
        self.totals.insert((partition, holder), total);
        self.holds.insert(
            (partition, holder, hold_id),
            StoredHold {
                amount: ScaledAmount::new(hold.amount, factor),
                hold,
            },
        );
        Ok(created)
    }

    fn held_amount(
        &self,
        partition: Partition,
        holder: AccountId,
        factor: AdjustmentFactor,
    ) -> Result<Amount> {
        self.totals
            .get(&(partition, holder))
            .map_or(Ok(0), |total| total.adjusted(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokenclear_types::AdjustmentStep;

    fn hold(amount: Amount) -> Hold {
        Hold {
            amount,
            expiration: Utc::now() + chrono::Duration::hours(1),
            escrow: AccountId::new(),
            to: None,
            data: Vec::new(),
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let mut bridge = InMemoryHoldBridge::new();
        let p = Partition::DEFAULT;
        let holder = AccountId::new();
        let id = AdjustmentFactor::IDENTITY;
        let first = bridge.create_hold(p, holder, hold(10), id).unwrap();
        let second = bridge.create_hold(p, holder, hold(5), id).unwrap();
        assert_eq!(first.hold_id, HoldId(1));
        assert_eq!(second.hold_id, HoldId(2));
        assert_eq!(bridge.held_amount(p, holder, id).unwrap(), 15);
        assert_eq!(bridge.count(), 2);
        assert!(bridge.get(p, holder, HoldId(1)).is_some());
    }

    #[test]
    fn zero_escrow_rejected() {
        let mut bridge = InMemoryHoldBridge::new();
        let mut h = hold(10);
        h.escrow = AccountId::ZERO;
        let err = bridge
            .create_hold(Partition::DEFAULT, AccountId::new(), h, AdjustmentFactor::IDENTITY)
            .unwrap_err();
        assert_eq!(err, ClearingError::ZeroAddressNotAllowed);
        assert_eq!(bridge.count(), 0);
    }

    #[test]
    fn held_amount_rescales() {
        let mut bridge = InMemoryHoldBridge::new();
        let p = Partition::DEFAULT;
        let holder = AccountId::new();
        bridge
            .create_hold(p, holder, hold(10), AdjustmentFactor::IDENTITY)
            .unwrap();
        let tripled = AdjustmentFactor::IDENTITY
            .apply(AdjustmentStep::new(3, 0).unwrap())
            .unwrap();
        assert_eq!(bridge.held_amount(p, holder, tripled).unwrap(), 30);
    }
}
