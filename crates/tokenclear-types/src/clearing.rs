//! # Clearing operations: pending, reversible token locks
//!
//! A clearing debits a holder's free balance into a locked "cleared" bucket
//! and waits for a clearing validator to finalize it.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  create   ┌─────────┐  approve   ┌─────────┐
//!   │ NONE ├──────────▶│ PENDING ├───────────▶│ SETTLED │
//!   └──────┘           └────┬────┘            └─────────┘
//!                           │ cancel            ┌───────────┐
//!                           ├──────────────────▶│ CANCELLED │
//!                           │ reclaim (expired) └───────────┘
//!                           │                   ┌───────────┐
//!                           └──────────────────▶│ RECLAIMED │
//!                                               └───────────┘
//! ```
//!
//! Terminal states are represented by removing the record from the store;
//! only PENDING records exist.
//!
//! ## Record shape
//!
//! Every record shares a [`ClearingHeader`]; the kind-specific payload is a
//! [`ClearingKind`]: a destination for transfers, nothing for redemptions,
//! hold parameters for hold creations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, AdjustmentFactor, Amount, ClearingId, Partition, Result};

// ---------------------------------------------------------------------------
// ClearingOperationType
// ---------------------------------------------------------------------------

/// What a clearing turns into when it is approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ClearingOperationType {
    /// Deliver the tokens to a destination.
    Transfer,
    /// Burn the tokens.
    Redeem,
    /// Convert the tokens into an escrow hold.
    HoldCreation,
}

impl ClearingOperationType {
    pub const ALL: [Self; 3] = [Self::Transfer, Self::Redeem, Self::HoldCreation];
}

impl fmt::Display for ClearingOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Redeem => write!(f, "REDEEM"),
            Self::HoldCreation => write!(f, "HOLD_CREATION"),
        }
    }
}

/// How a pending clearing left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClearingOutcome {
    Settled,
    Cancelled,
    Reclaimed,
}

impl fmt::Display for ClearingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settled => write!(f, "SETTLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Reclaimed => write!(f, "RECLAIMED"),
        }
    }
}

// ---------------------------------------------------------------------------
// ClearingIdentifier
// ---------------------------------------------------------------------------

/// Full identity of a pending clearing. The operation type is part of the
/// identity: a lookup with the wrong type fails even if the id exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClearingIdentifier {
    pub partition: Partition,
    pub token_holder: AccountId,
    pub clearing_id: ClearingId,
    pub operation_type: ClearingOperationType,
}

impl fmt::Display for ClearingIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.partition.short(),
            self.token_holder,
            self.clearing_id.0,
            self.operation_type
        )
    }
}

// ---------------------------------------------------------------------------
// Caller inputs
// ---------------------------------------------------------------------------

/// Common creation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingOperation {
    pub partition: Partition,
    pub expiration: DateTime<Utc>,
    pub data: Vec<u8>,
}

/// Creation parameters for the allowance ("From") and operator shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingOperationFrom {
    pub operation: ClearingOperation,
    pub from: AccountId,
    pub operator_data: Vec<u8>,
}

/// Escrow hold parameters carried by a HoldCreation clearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub amount: Amount,
    pub expiration: DateTime<Utc>,
    pub escrow: AccountId,
    /// Fixed beneficiary, or `None` when the escrow picks one at execution.
    pub to: Option<AccountId>,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// ClearingRecord
// ---------------------------------------------------------------------------

/// Fields shared by every clearing kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingHeader {
    pub partition: Partition,
    pub token_holder: AccountId,
    pub clearing_id: ClearingId,
    /// Principal at the scale of `creation_factor`.
    pub amount: Amount,
    pub expiration: DateTime<Utc>,
    pub data: Vec<u8>,
    pub operator_data: Vec<u8>,
    /// Balance adjustment factor snapshotted at creation.
    pub creation_factor: AdjustmentFactor,
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearingKind {
    Transfer { destination: AccountId },
    Redeem,
    HoldCreation(Hold),
}

impl ClearingKind {
    #[must_use]
    pub fn operation_type(&self) -> ClearingOperationType {
        match self {
            Self::Transfer { .. } => ClearingOperationType::Transfer,
            Self::Redeem => ClearingOperationType::Redeem,
            Self::HoldCreation(_) => ClearingOperationType::HoldCreation,
        }
    }

    /// The account that receives tokens on approval, if any.
    #[must_use]
    pub fn destination(&self) -> Option<AccountId> {
        match self {
            Self::Transfer { destination } => Some(*destination),
            Self::Redeem => None,
            Self::HoldCreation(hold) => hold.to,
        }
    }
}

/// A pending clearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingRecord {
    pub header: ClearingHeader,
    pub kind: ClearingKind,
}

impl ClearingRecord {
    #[must_use]
    pub fn operation_type(&self) -> ClearingOperationType {
        self.kind.operation_type()
    }

    #[must_use]
    pub fn identifier(&self) -> ClearingIdentifier {
        ClearingIdentifier {
            partition: self.header.partition,
            token_holder: self.header.token_holder,
            clearing_id: self.header.clearing_id,
            operation_type: self.operation_type(),
        }
    }

    /// Strictly past the expiration.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.header.expiration
    }

    /// Copy of this record with principal (and hold amount) rescaled to
    /// `current`. The creation factor is left as recorded.
    pub fn adjusted(&self, current: AdjustmentFactor) -> Result<Self> {
        let factor = self.header.creation_factor;
        let mut record = self.clone();
        record.header.amount = current.rescale(self.header.amount, factor)?;
        if let ClearingKind::HoldCreation(hold) = &mut record.kind {
            hold.amount = current.rescale(hold.amount, factor)?;
        }
        Ok(record)
    }
}

/// Dummy records for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl ClearingRecord {
    /// Transfer clearing expiring in one hour.
    pub fn dummy_transfer(
        partition: Partition,
        token_holder: AccountId,
        clearing_id: ClearingId,
        amount: Amount,
    ) -> Self {
        Self::dummy(
            partition,
            token_holder,
            clearing_id,
            amount,
            ClearingKind::Transfer {
                destination: AccountId::new(),
            },
        )
    }

    /// Record of any kind expiring in one hour.
    pub fn dummy(
        partition: Partition,
        token_holder: AccountId,
        clearing_id: ClearingId,
        amount: Amount,
        kind: ClearingKind,
    ) -> Self {
        Self {
            header: ClearingHeader {
                partition,
                token_holder,
                clearing_id,
                amount,
                expiration: Utc::now() + chrono::Duration::hours(1),
                data: Vec::new(),
                operator_data: Vec::new(),
                creation_factor: AdjustmentFactor::IDENTITY,
            },
            kind,
        }
    }

    /// Dummy hold payload for `amount`.
    pub fn dummy_hold(amount: Amount) -> Hold {
        Hold {
            amount,
            expiration: Utc::now() + chrono::Duration::hours(2),
            escrow: AccountId::new(),
            to: None,
            data: rand::random::<[u8; 4]>().to_vec(),
        }
    }
}
