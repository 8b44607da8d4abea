//! System-wide constants for the TokenClear engine.

/// Decimals of a freshly issued token, before any balance adjustment.
pub const DEFAULT_BASE_DECIMALS: u32 = 6;

/// Maximum number of clearing ids returned by one page query.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1_000;

/// `rust_decimal` cannot display more decimal places than this.
pub const MAX_DISPLAY_DECIMALS: u32 = 28;

