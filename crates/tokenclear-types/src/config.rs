//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{ClearingError, Result, constants};

/// Configuration for one ledger's clearing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether partitions other than [`crate::Partition::DEFAULT`] are allowed.
    pub multi_partition: bool,
    /// Whether clearing mode starts switched on.
    pub clearing_active: bool,
    /// Token decimals before any balance adjustment.
    pub base_decimals: u32,
    /// Upper bound on `limit` for clearing id page queries.
    pub max_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            multi_partition: false,
            clearing_active: true,
            base_decimals: constants::DEFAULT_BASE_DECIMALS,
            max_page_size: constants::DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Multi-partition ledger with clearing switched on.
    #[must_use]
    pub fn multi_partition() -> Self {
        Self {
            multi_partition: true,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`ClearingError::Configuration`] for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(ClearingError::Configuration(
                "max_page_size must be > 0".to_string(),
            ));
        }
        if self.base_decimals > constants::MAX_DISPLAY_DECIMALS {
            return Err(ClearingError::Configuration(format!(
                "base_decimals {} exceeds {}",
                self.base_decimals,
                constants::MAX_DISPLAY_DECIMALS
            )));
        }
        Ok(())
    }
}
