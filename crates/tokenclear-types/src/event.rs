//! Events emitted by the clearing engine.
//!
//! The engine appends one event per successful state change; hosts drain
//! them after each call and forward them to their own audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AccountId, AdjustmentFactor, AdjustmentStep, Amount, ClearingId, ClearingIdentifier,
    ClearingOutcome, HoldId, Partition,
};

/// A single observable side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearingEvent {
    /// A Transfer clearing was created.
    ClearedTransfer {
        operator: AccountId,
        token_holder: AccountId,
        to: AccountId,
        partition: Partition,
        clearing_id: ClearingId,
        amount: Amount,
        operator_data: Vec<u8>,
    },
    /// A Redeem clearing was created.
    ClearedRedeem {
        operator: AccountId,
        token_holder: AccountId,
        partition: Partition,
        clearing_id: ClearingId,
        amount: Amount,
        operator_data: Vec<u8>,
    },
    /// A HoldCreation clearing was created.
    ClearedHold {
        operator: AccountId,
        token_holder: AccountId,
        to: Option<AccountId>,
        partition: Partition,
        clearing_id: ClearingId,
        amount: Amount,
        operator_data: Vec<u8>,
    },
    /// A pending clearing left the store.
    ClearingResolved {
        operator: AccountId,
        identifier: ClearingIdentifier,
        outcome: ClearingOutcome,
        /// Principal rescaled to the factor current at resolution.
        amount: Amount,
    },
    /// The hold bridge materialized a hold from an approved clearing.
    HoldCreated {
        token_holder: AccountId,
        partition: Partition,
        hold_id: HoldId,
        escrow: AccountId,
        amount: Amount,
    },
    ClearingActivated {
        operator: AccountId,
    },
    ClearingDeactivated {
        operator: AccountId,
    },
    /// A balance adjustment was applied (globally when `partition` is `None`).
    BalancesAdjusted {
        operator: AccountId,
        partition: Option<Partition>,
        step: AdjustmentStep,
        factor: AdjustmentFactor,
    },
    /// A global balance adjustment was queued for later execution.
    BalanceAdjustmentScheduled {
        operator: AccountId,
        execution_time: DateTime<Utc>,
        step: AdjustmentStep,
    },
}

impl ClearingEvent {
    /// Short stable name, used as a log field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClearedTransfer { .. } => "CLEARED_TRANSFER",
            Self::ClearedRedeem { .. } => "CLEARED_REDEEM",
            Self::ClearedHold { .. } => "CLEARED_HOLD",
            Self::ClearingResolved { .. } => "CLEARING_RESOLVED",
            Self::HoldCreated { .. } => "HOLD_CREATED",
            Self::ClearingActivated { .. } => "CLEARING_ACTIVATED",
            Self::ClearingDeactivated { .. } => "CLEARING_DEACTIVATED",
            Self::BalancesAdjusted { .. } => "BALANCES_ADJUSTED",
            Self::BalanceAdjustmentScheduled { .. } => "BALANCE_ADJUSTMENT_SCHEDULED",
        }
    }
}
