//! Identifiers used throughout TokenClear.
//!
//! Accounts use UUIDv7 (the nil UUID plays the role of the zero address),
//! partitions are opaque 32-byte keys, and clearing ids are per-holder
//! sequence numbers.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Raw token amount in base units.
pub type Amount = u128;

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Token holder, operator, escrow or validator account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    /// The zero address. Never a valid source, destination or escrow.
    pub const ZERO: Self = Self(Uuid::nil());

    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// Sub-ledger key for a holder's balance (e.g. a share class).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Partition(pub [u8; 32]);

impl Partition {
    /// The only partition accepted in single-partition mode.
    pub const DEFAULT: Self = {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        Self(bytes)
    };

    /// Derive a partition key from a human-readable label.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"tokenclear:partition:v1:");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    /// The all-zero key is never a valid partition.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[28..])
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition:{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// ClearingId
// ---------------------------------------------------------------------------

/// Per-(partition, holder) clearing sequence number. The first id is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ClearingId(pub u64);

impl ClearingId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ClearingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clearing:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HoldId
// ---------------------------------------------------------------------------

/// Per-(partition, holder) hold sequence number assigned by the hold bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct HoldId(pub u64);

impl fmt::Display for HoldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hold:{}", self.0)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Partition {
    /// Random partition key for tests.
    pub fn random() -> Self {
        Self(rand::random::<[u8; 32]>())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
