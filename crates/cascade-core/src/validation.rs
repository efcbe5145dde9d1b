//! Stateless validation of repo ids, addresses, assets, and rule maps.
//!
//! Nothing here touches contract state. Validators either return the fully
//! typed value or the first error found, so a rejected input can never be
//! partially applied.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::constants::{BASE_ASSET_LABEL, FULL_SHARE, KEY_SEPARATOR, MAX_RULES, PERCENT_PRECISION, REPO_SEPARATOR};
use crate::error::{RepoError, RuleError};
use crate::rules::Rules;
use crate::types::{Address, Asset, Percent, RepoId};

/// Characters that may never appear in an identifier used inside a state key.
fn is_bad_symbol(c: char) -> bool {
    c.is_whitespace() || c.is_control() || c == KEY_SEPARATOR
}

/// Validate a project identifier of the form `owner/name`.
///
/// Exactly one `/` with a non-empty segment on each side. Whitespace,
/// control characters and the state-key separator are rejected as bad
/// symbols. Nothing else is restricted.
///
/// # Examples
///
/// ```
/// use cascade_core::validation::validate_repo_id;
/// assert!(validate_repo_id("alice/my.project").is_ok());
/// assert!(validate_repo_id("wrong/repo/name").is_err());
/// ```
pub fn validate_repo_id(s: &str) -> Result<RepoId, RepoError> {
    let mut parts = s.split(REPO_SEPARATOR);
    let owner = parts.next().unwrap_or("");
    let name = parts.next();
    let well_formed = match name {
        Some(name) => parts.next().is_none() && !owner.is_empty() && !name.is_empty(),
        None => false,
    };
    if !well_formed {
        return Err(RepoError::InvalidFormat(s.to_string()));
    }
    if s.chars().any(is_bad_symbol) {
        return Err(RepoError::BadSymbols);
    }
    Ok(RepoId::new_unchecked(s.to_string()))
}

/// Addresses share the `to`/`from` key space with repo ids and so may not
/// look like one.
fn is_bad_address_symbol(c: char) -> bool {
    is_bad_symbol(c) || c == REPO_SEPARATOR
}

/// Validate a ledger address.
pub fn validate_address(s: &str) -> Result<Address, RepoError> {
    if s.is_empty() || s.chars().any(is_bad_address_symbol) {
        return Err(RepoError::InvalidAddress(s.to_string()));
    }
    Ok(Address::new_unchecked(s.to_string()))
}

/// Parse an asset identifier. `base` is always the native asset.
pub fn validate_asset(s: &str) -> Result<Asset, RepoError> {
    if s == BASE_ASSET_LABEL {
        return Ok(Asset::Base);
    }
    if s.is_empty() || s.chars().any(is_bad_symbol) {
        return Err(RepoError::InvalidAsset(s.to_string()));
    }
    Ok(Asset::Custom(s.to_string()))
}

/// Rendering of a rejected rule value: strings bare, anything else as JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Exact fixed-point units of a non-negative decimal literal, or `None` when
/// it has digits below `1 / PERCENT_PRECISION` percent.
fn exact_units(literal: &str) -> Option<u128> {
    let literal = literal.trim_start_matches('-');
    let (mantissa, exp) = match literal.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().ok()?),
        None => (literal, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits: u128 = format!("{int}{frac}").parse().ok()?;
    let scaled = digits.checked_mul(PERCENT_PRECISION as u128)?;

    let exp10 = exp.checked_sub(i32::try_from(frac.len()).ok()?)?;
    if exp10 >= 0 {
        return scaled.checked_mul(10u128.checked_pow(exp10.unsigned_abs())?);
    }
    if scaled == 0 {
        return Some(0);
    }
    let divisor = 10u128.checked_pow(exp10.unsigned_abs())?;
    (scaled % divisor == 0).then(|| scaled / divisor)
}

/// Parse one rule value into a fixed-point share.
///
/// Only JSON numbers are accepted; numeric-looking strings are not. The
/// decimal literal is converted exactly, so a share finer than the fixed
/// point is rejected instead of rounded.
fn parse_percent(value: &Value, key: &str) -> Result<Percent, RuleError> {
    let not_a_number = || RuleError::NotANumber {
        value: render_value(value),
        repo: key.to_string(),
    };
    let number = value.as_number().ok_or_else(not_a_number)?;
    let percent = number.as_f64().ok_or_else(not_a_number)?;
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(RuleError::PercentOutOfRange);
    }
    let units = exact_units(&number.to_string()).ok_or_else(|| RuleError::TooPrecise {
        value: number.to_string(),
        repo: key.to_string(),
    })?;
    if units > FULL_SHARE as u128 {
        return Err(RuleError::PercentOutOfRange);
    }
    Ok(Percent::from_units(units as u64))
}

/// Validate a raw rule map for `own`.
///
/// Checks, in order: object shape, entry count, then each entry (key format,
/// self-reference, value type and range) in key order, then the total.
///
/// # Examples
///
/// ```
/// use cascade_core::validation::validate_rules;
/// let own = "alice/app".parse().unwrap();
/// let rules = validate_rules(&serde_json::json!({"repo/1": 5, "repo/2": 10.5}), &own).unwrap();
/// assert_eq!(rules.len(), 2);
/// let err = validate_rules(&serde_json::json!({"alice/app": 5}), &own).unwrap_err();
/// assert!(err.to_string().contains("Don't set own repo in rules"));
/// ```
pub fn validate_rules(raw: &Value, own: &RepoId) -> Result<Rules, RuleError> {
    let Value::Object(map) = raw else {
        return Err(RuleError::NotAnObject);
    };
    if map.len() > MAX_RULES {
        return Err(RuleError::TooManyRecipients { max: MAX_RULES });
    }

    let mut entries = BTreeMap::new();
    let mut total: u64 = 0;
    for (key, value) in map {
        let target = validate_repo_id(key)?;
        if &target == own {
            return Err(RepoError::SelfReference(own.to_string()).into());
        }
        let percent = parse_percent(value, key)?;
        // Each share is capped at FULL_SHARE and there are at most MAX_RULES.
        total += percent.units();
        entries.insert(target, percent);
    }
    if total > FULL_SHARE {
        return Err(RuleError::SumExceeded);
    }
    Ok(Rules::from_map(entries))
}
