//! Roles consulted by the guard chain.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access-control roles relevant to clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Role {
    /// Toggles clearing mode and creates clearings on one's own balance.
    Clearing,
    /// Approves, cancels and reclaims pending clearings.
    ClearingValidator,
    /// Triggers or schedules balance adjustments.
    AdjustmentBalance,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clearing => write!(f, "CLEARING_ROLE"),
            Self::ClearingValidator => write!(f, "CLEARING_VALIDATOR_ROLE"),
            Self::AdjustmentBalance => write!(f, "ADJUSTMENT_BALANCE_ROLE"),
        }
    }
}
