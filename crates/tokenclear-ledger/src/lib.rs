//! # tokenclear-ledger
//!
//! Balance state underneath the clearing engine:
//!
//! 1. **BalanceAdjustmentRegistry**: cumulative per-partition adjustment
//!    factors, scheduled adjustments, O(1) rescaling
//! 2. **Ledger** / **InMemoryLedger**: partitioned free and frozen balances
//!    with lazy rescaling
//! 3. **SupplyTracker**: issuance and burn totals for the conservation check
//!
//! ```text
//! adjust_balances ─▶ BalanceAdjustmentRegistry ─┐ factor
//!                                                ▼
//!                        Ledger.free_balance(partition, account, factor)
//! ```

pub mod adjustment;
pub mod ledger;
pub mod supply;

pub use adjustment::BalanceAdjustmentRegistry;
pub use ledger::{InMemoryLedger, Ledger, ledger_held_supply};
pub use supply::SupplyTracker;
