//! # tokenclear-clearing
//!
//! **Clearing lifecycle**: pending, validator-approved token movements on a
//! partitioned ledger with lazy balance adjustments.
//!
//! ## Architecture
//!
//! ```text
//!  caller ─▶ ClearingEngine ─▶ GuardChain (pause, roles, KYC, control list, compliance)
//!                 │
//!                 ├─▶ ClearingStore            pending records + per-type index
//!                 ├─▶ BalanceAdjustmentRegistry factor snapshot / rescale
//!                 ├─▶ Ledger                   free balance, burn
//!                 └─▶ HoldBridge               holds from approved clearings
//! ```
//!
//! A clearing moves tokens from the holder's free balance into a cleared
//! bucket. A clearing validator then approves it (tokens reach their
//! destination, are burned, or become a hold), cancels it, or reclaims it
//! after expiry (tokens return to the holder).
//!
//! ## Components
//!
//! 1. **`ClearingEngine`**: lifecycle controller; creation shapes in
//!    `create`, resolution in `settle`
//! 2. **`ClearingStore`**: keyed records, type-scoped lookup, swap-and-pop index
//! 3. **`GuardChain`** / **`InMemoryGuardChain`**: checks consulted on
//!    every call
//! 4. **`HoldBridge`** / **`InMemoryHoldBridge`**: hold creation entry point
//! 5. **`SharedClearingEngine`**: `RwLock` handle for concurrent hosts

pub mod clock;
pub mod create;
pub mod engine;
pub mod guard;
pub mod hold_bridge;
pub mod settle;
pub mod shared;
pub mod store;

#[cfg(test)]
mod testkit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::ClearingEngine;
pub use guard::{ControlListMode, GuardChain, InMemoryGuardChain};
pub use hold_bridge::{HoldBridge, HoldCreated, InMemoryHoldBridge, StoredHold};
pub use shared::SharedClearingEngine;
pub use store::ClearingStore;
