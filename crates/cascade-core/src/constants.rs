//! Contract constants. Amounts are in the smallest unit of their asset.

/// Fixed-point units per one percent.
///
/// # Examples
///
/// ```
/// use cascade_core::constants::{FULL_SHARE, PERCENT_PRECISION};
/// assert_eq!(FULL_SHARE, 100 * PERCENT_PRECISION);
/// ```
pub const PERCENT_PRECISION: u64 = 1_000_000;

/// One hundred percent in fixed-point units.
pub const FULL_SHARE: u64 = 100 * PERCENT_PRECISION;

/// Maximum number of recipient repos in one rule set.
pub const MAX_RULES: usize = 10;

/// Label used for the native ledger asset in keys and response variables.
pub const BASE_ASSET_LABEL: &str = "base";

/// Separator between the components of a persisted state key.
pub const KEY_SEPARATOR: char = '*';

/// Separator between the owner handle and the project name of a repo id.
pub const REPO_SEPARATOR: char = '/';

/// Minimum native attachment on every trigger; withheld from bounce refunds.
pub const DEFAULT_PROCESSING_FEE: u64 = 10_000;

/// Native fee covering the ledger rows a donation creates.
pub const DEFAULT_DONATION_STORAGE_FEE: u64 = 1_000;

/// Native fee covering storage of a rule set.
pub const DEFAULT_RULES_STORAGE_FEE: u64 = 1_000;

/// Default JSON-RPC port of the settlement node.
pub const DEFAULT_RPC_PORT: u16 = 18_640;
