//! # tokenclear-types
//!
//! Shared types, errors, and configuration for the **TokenClear** clearing
//! and settlement engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`Partition`], [`ClearingId`], [`HoldId`], [`Amount`]
//! - **Clearing model**: [`ClearingRecord`], [`ClearingHeader`], [`ClearingKind`], [`ClearingIdentifier`], [`Hold`]
//! - **Adjustment math**: [`AdjustmentStep`], [`AdjustmentFactor`], [`ScaledAmount`]
//! - **Balances**: [`PartitionBalance`]
//! - **Events**: [`ClearingEvent`]
//! - **Access control**: [`Role`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`ClearingError`] with `TC_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod balance;
pub mod clearing;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod factor;
pub mod ids;
pub mod role;

// Re-export all primary types at crate root for ergonomic imports:
//   use tokenclear_types::{ClearingRecord, Partition, AccountId, ...};

pub use balance::*;
pub use clearing::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use factor::*;
pub use ids::*;
pub use role::*;

// Constants are accessed via `tokenclear_types::constants::FOO`
// (not re-exported to avoid name collisions).
