//! Balance breakdown for a (partition, account) pair.
//!
//! Every token an account owns on a partition sits in exactly one bucket:
//! `free` (spendable), `cleared` (locked by a pending clearing), `held`
//! (locked by a hold) or `frozen` (locked by an administrator).

use serde::{Deserialize, Serialize};

use crate::{Amount, ClearingError, Result};

/// Adjusted balance buckets for one (partition, account).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PartitionBalance {
    pub free: Amount,
    pub cleared: Amount,
    pub held: Amount,
    pub frozen: Amount,
}

impl PartitionBalance {
    /// Total balance across all buckets.
    ///
    /// # Errors
    /// Returns [`ClearingError::ArithmeticOverflow`] if the sum overflows.
    pub fn total(&self) -> Result<Amount> {
        [self.cleared, self.held, self.frozen]
            .into_iter()
            .try_fold(self.free, Amount::checked_add)
            .ok_or(ClearingError::ArithmeticOverflow)
    }

    /// Whether this entry has no balance at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.free == 0 && self.cleared == 0 && self.held == 0 && self.frozen == 0
    }
}
