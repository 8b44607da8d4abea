//! Error types for the TokenClear clearing engine.
//!
//! All errors use the `TC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Mode and access errors
//! - 2xx: Validation errors
//! - 3xx: Clearing lookup errors
//! - 4xx: Guard-chain errors (re-evaluated at settlement)
//! - 9xx: General / internal errors

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{AccountId, Amount, ClearingId, ClearingOperationType, Partition, Role};

/// Central error enum for all TokenClear operations.
///
/// Every failure aborts the call that produced it with no state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClearingError {
    // =================================================================
    // Mode / Access Errors (1xx)
    // =================================================================
    /// Clearing mode is switched off.
    #[error("TC_ERR_100: Clearing is disabled")]
    ClearingIsDisabled,

    /// The caller lacks the role required for this operation.
    #[error("TC_ERR_101: Account {account} has no role {role}")]
    AccountHasNoRole { account: AccountId, role: Role },

    /// Operator shape used by an account that is not an operator for the holder.
    #[error("TC_ERR_102: Operator {operator} is not authorized for {holder}")]
    Unauthorized {
        operator: AccountId,
        holder: AccountId,
    },

    /// "From" shape used without enough allowance.
    #[error("TC_ERR_103: Insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: Amount, available: Amount },

    // =================================================================
    // Validation Errors (2xx)
    // =================================================================
    /// A source, destination or escrow is the zero address.
    #[error("TC_ERR_200: Zero address not allowed")]
    ZeroAddressNotAllowed,

    /// The expiration is not strictly in the future.
    #[error("TC_ERR_201: Wrong expiration timestamp {expiration} (now {now})")]
    WrongExpirationTimestamp {
        expiration: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// The partition key is not a valid partition.
    #[error("TC_ERR_202: Invalid partition {0}")]
    InvalidPartition(Partition),

    /// A non-default partition was used while the ledger runs with one partition.
    #[error("TC_ERR_203: Partition {0} not allowed in single partition mode")]
    PartitionNotAllowedInSinglePartitionMode(Partition),

    /// Not enough adjusted free balance.
    #[error("TC_ERR_204: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    /// Clearing a zero amount.
    #[error("TC_ERR_205: Amount must be greater than zero")]
    ZeroAmount,

    /// A balance adjustment step with a zero factor.
    #[error("TC_ERR_206: Invalid adjustment factor: {reason}")]
    InvalidAdjustmentFactor { reason: String },

    // =================================================================
    // Lookup Errors (3xx)
    // =================================================================
    /// No pending clearing under this identifier (or it has another type).
    #[error("TC_ERR_300: Wrong clearing id {clearing_id} ({operation_type}) for {holder}")]
    WrongClearingId {
        holder: AccountId,
        clearing_id: ClearingId,
        operation_type: ClearingOperationType,
    },

    /// A record already exists for this (partition, holder, id).
    #[error("TC_ERR_301: Duplicate clearing id {0}")]
    DuplicateClearingId(ClearingId),

    /// Reclaim attempted before the clearing expired.
    #[error("TC_ERR_302: Clearing {clearing_id} not expired until {expiration}")]
    ClearingNotExpired {
        clearing_id: ClearingId,
        expiration: DateTime<Utc>,
    },

    // =================================================================
    // Guard-Chain Errors (4xx)
    // =================================================================
    /// The token is paused. Takes precedence over every other check.
    #[error("TC_ERR_400: Token is paused")]
    TokenIsPaused,

    /// The account is on the control list.
    #[error("TC_ERR_401: Account {0} is blocked")]
    AccountIsBlocked(AccountId),

    /// The account has no valid KYC.
    #[error("TC_ERR_402: Invalid KYC status for {0}")]
    InvalidKycStatus(AccountId),

    /// The compliance oracle refused the equivalent free movement.
    #[error("TC_ERR_403: Compliance not allowed: {reason}")]
    ComplianceNotAllowed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Amount arithmetic overflowed `u128`.
    #[error("TC_ERR_900: Arithmetic overflow")]
    ArithmeticOverflow,

    /// Adjusted balances no longer add up to the adjusted supply.
    #[error("TC_ERR_901: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// Configuration error (invalid config file, bad values, etc.).
    #[error("TC_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Unrecoverable internal error.
    #[error("TC_ERR_999: Internal error: {0}")]
    Internal(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ClearingError>;

impl From<serde_json::Error> for ClearingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}
