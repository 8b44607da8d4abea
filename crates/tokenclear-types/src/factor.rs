//! Balance Adjustment Factor arithmetic.
//!
//! A corporate action (e.g. a stock split) is an [`AdjustmentStep`]: an
//! integer multiplier plus a decimal shift. The registry folds every step
//! into a cumulative [`AdjustmentFactor`] that is never reset. Stored amounts
//! are [`ScaledAmount`]s: a raw value plus the factor that was current when
//! it was written. Reading one rescales it by `current / recorded`.
//!
//! ```text
//!   raw × current.value / recorded.value        (floor)
//! ```
//!
//! Because the factor is a running product, `recorded.value` always divides
//! `current.value` for factors produced by the same registry, so rescaling
//! is exact in practice.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Amount, ClearingError, Result};

// ---------------------------------------------------------------------------
// AdjustmentStep
// ---------------------------------------------------------------------------

/// One balance adjustment: multiply raw balances by `factor` and shift the
/// token's decimals by `decimals`.
///
/// A 2.53x split is `factor = 253, decimals = 2`: raw balances grow 253x and
/// two more decimal places are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjustmentStep {
    pub factor: u128,
    pub decimals: u32,
}

impl AdjustmentStep {
    /// # Errors
    /// Returns [`ClearingError::InvalidAdjustmentFactor`] for a zero factor.
    pub fn new(factor: u128, decimals: u32) -> Result<Self> {
        if factor == 0 {
            return Err(ClearingError::InvalidAdjustmentFactor {
                reason: "factor must be greater than zero".to_string(),
            });
        }
        Ok(Self { factor, decimals })
    }

    /// Build a step from a human ratio such as `2.53`.
    ///
    /// # Errors
    /// Returns [`ClearingError::InvalidAdjustmentFactor`] unless `ratio > 0`.
    pub fn from_decimal(ratio: Decimal) -> Result<Self> {
        if ratio <= Decimal::ZERO {
            return Err(ClearingError::InvalidAdjustmentFactor {
                reason: format!("ratio {ratio} must be positive"),
            });
        }
        let normalized = ratio.normalize();
        let mantissa = u128::try_from(normalized.mantissa()).map_err(|_| {
            ClearingError::InvalidAdjustmentFactor {
                reason: format!("ratio {ratio} out of range"),
            }
        })?;
        Self::new(mantissa, normalized.scale())
    }

    /// The human ratio this step represents.
    #[must_use]
    pub fn ratio(&self) -> Option<Decimal> {
        let mantissa = i128::try_from(self.factor).ok()?;
        Decimal::try_from_i128_with_scale(mantissa, self.decimals).ok()
    }
}

impl fmt::Display for AdjustmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}e-{}", self.factor, self.decimals)
    }
}

// ---------------------------------------------------------------------------
// AdjustmentFactor
// ---------------------------------------------------------------------------

/// Cumulative product of every applied [`AdjustmentStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjustmentFactor {
    /// Product of all step factors.
    pub value: u128,
    /// Sum of all step decimal shifts.
    pub decimals: u32,
}

impl AdjustmentFactor {
    /// The factor before any adjustment.
    pub const IDENTITY: Self = Self {
        value: 1,
        decimals: 0,
    };

    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Fold one more step into the cumulative factor.
    ///
    /// # Errors
    /// Returns [`ClearingError::ArithmeticOverflow`] if the product overflows.
    pub fn apply(self, step: AdjustmentStep) -> Result<Self> {
        Ok(Self {
            value: self
                .value
                .checked_mul(step.factor)
                .ok_or(ClearingError::ArithmeticOverflow)?,
            decimals: self
                .decimals
                .checked_add(step.decimals)
                .ok_or(ClearingError::ArithmeticOverflow)?,
        })
    }

    /// Compose two cumulative factors (global ∘ partition).
    ///
    /// # Errors
    /// Returns [`ClearingError::ArithmeticOverflow`] if the product overflows.
    pub fn compose(self, other: Self) -> Result<Self> {
        self.apply(AdjustmentStep {
            factor: other.value,
            decimals: other.decimals,
        })
    }

    /// Rescale `amount` recorded under `recorded` to this (current) factor.
    ///
    /// Exact identity when `recorded == self`; floor rounding otherwise.
    ///
    /// # Errors
    /// - [`ClearingError::ArithmeticOverflow`] if the scaled value overflows
    /// - [`ClearingError::Internal`] if `recorded` has a zero value
    pub fn rescale(&self, amount: Amount, recorded: Self) -> Result<Amount> {
        if recorded.value == self.value {
            return Ok(amount);
        }
        if recorded.value == 0 {
            return Err(ClearingError::Internal(
                "recorded adjustment factor is zero".to_string(),
            ));
        }
        if self.value % recorded.value == 0 {
            return amount
                .checked_mul(self.value / recorded.value)
                .ok_or(ClearingError::ArithmeticOverflow);
        }
        amount
            .checked_mul(self.value)
            .map(|scaled| scaled / recorded.value)
            .ok_or(ClearingError::ArithmeticOverflow)
    }
}

impl Default for AdjustmentFactor {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for AdjustmentFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}e-{}", self.value, self.decimals)
    }
}

// ---------------------------------------------------------------------------
// ScaledAmount
// ---------------------------------------------------------------------------

/// A stored amount together with the factor it was recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScaledAmount {
    pub raw: Amount,
    pub factor: AdjustmentFactor,
}

impl ScaledAmount {
    #[must_use]
    pub fn new(raw: Amount, factor: AdjustmentFactor) -> Self {
        Self { raw, factor }
    }

    /// Value of this amount under `current`.
    pub fn adjusted(&self, current: AdjustmentFactor) -> Result<Amount> {
        current.rescale(self.raw, self.factor)
    }

    /// Rebase to `current` and add `amount`. Unchanged on error.
    pub fn add(&mut self, amount: Amount, current: AdjustmentFactor) -> Result<()> {
        let raw = self
            .adjusted(current)?
            .checked_add(amount)
            .ok_or(ClearingError::ArithmeticOverflow)?;
        *self = Self::new(raw, current);
        Ok(())
    }

    /// Rebase to `current` and subtract `amount`. Unchanged on error.
    ///
    /// # Errors
    /// Returns [`ClearingError::InsufficientBalance`] if the adjusted value is
    /// smaller than `amount`.
    pub fn sub(&mut self, amount: Amount, current: AdjustmentFactor) -> Result<()> {
        let available = self.adjusted(current)?;
        let raw = available
            .checked_sub(amount)
            .ok_or(ClearingError::InsufficientBalance {
                needed: amount,
                available,
            })?;
        *self = Self::new(raw, current);
        Ok(())
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }
}
