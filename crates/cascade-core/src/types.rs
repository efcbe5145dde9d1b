//! Core contract types: repo ids, addresses, assets, triggers, responses.
//!
//! All amounts are `u64` in the smallest unit of their asset.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{BASE_ASSET_LABEL, PERCENT_PRECISION, REPO_SEPARATOR};
use crate::error::RepoError;
use crate::validation;

/// Amount in the smallest unit of an asset.
pub type Amount = u64;

/// A validated project identifier of the form `owner/name`.
///
/// Construct through [`FromStr`] (or [`validation::validate_repo_id`]) so the
/// format invariant always holds.
///
/// # Examples
///
/// ```
/// use cascade_core::types::RepoId;
/// let repo: RepoId = "alice/my.project".parse().unwrap();
/// assert_eq!(repo.owner(), "alice");
/// assert_eq!(repo.name(), "my.project");
/// ```
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(String);

impl RepoId {
    pub(crate) fn new_unchecked(id: String) -> Self {
        Self(id)
    }

    /// The account handle whose attested controller owns the repo.
    pub fn owner(&self) -> &str {
        self.0
            .split_once(REPO_SEPARATOR)
            .map(|(owner, _)| owner)
            .unwrap_or(&self.0)
    }

    /// The project name after the separator.
    pub fn name(&self) -> &str {
        self.0
            .split_once(REPO_SEPARATOR)
            .map(|(_, name)| name)
            .unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepoId {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validation::validate_repo_id(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = RepoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoId> for String {
    fn from(repo: RepoId) -> Self {
        repo.0
    }
}

/// A ledger account address.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub(crate) fn new_unchecked(address: String) -> Self {
        Self(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validation::validate_address(s)
    }
}

impl TryFrom<String> for Address {
    type Error = RepoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// The asset a pool row is denominated in.
///
/// # Examples
///
/// ```
/// use cascade_core::types::Asset;
/// assert_eq!("base".parse::<Asset>().unwrap(), Asset::Base);
/// assert_eq!(Asset::Custom("USDC".into()).label(), "USDC");
/// ```
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(try_from = "String", into = "String")]
pub enum Asset {
    /// The ledger's native currency.
    #[default]
    Base,
    /// Any other fungible asset, by identifier.
    Custom(String),
}

impl Asset {
    /// Label used in state keys and response variables.
    pub fn label(&self) -> &str {
        match self {
            Self::Base => BASE_ASSET_LABEL,
            Self::Custom(id) => id,
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, Self::Base)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Asset {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validation::validate_asset(s)
    }
}

impl TryFrom<String> for Asset {
    type Error = RepoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.label().to_string()
    }
}

/// A share in fixed point: [`PERCENT_PRECISION`] units per percent.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Percent(u64);

impl Percent {
    pub const ZERO: Self = Self(0);

    pub fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Whole percent, e.g. `Percent::from_whole(15)` is 15 %.
    pub fn from_whole(percent: u64) -> Self {
        Self(percent * PERCENT_PRECISION)
    }

    pub fn units(&self) -> u64 {
        self.0
    }

    /// Apply this share to `amount`, rounding down.
    ///
    /// # Examples
    ///
    /// ```
    /// use cascade_core::types::Percent;
    /// assert_eq!(Percent::from_whole(15).apply(100), 15);
    /// assert_eq!(Percent::from_whole(50).apply(25), 12);
    /// ```
    pub fn apply(&self, amount: Amount) -> Amount {
        let scaled = amount as u128 * self.0 as u128 / (100 * PERCENT_PRECISION as u128);
        // Shares never exceed 100 %, so the result fits in the input width.
        scaled as Amount
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PERCENT_PRECISION;
        let frac = self.0 % PERCENT_PRECISION;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:06}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// A non-native asset attached to a trigger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AssetPayment {
    pub asset: Asset,
    pub amount: Amount,
}

/// An incoming request as delivered by the host ledger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Trigger {
    /// Address that sent the request.
    pub address: Address,
    /// Native amount attached.
    pub base_amount: Amount,
    /// Optional attached non-native payment.
    #[serde(default)]
    pub payment: Option<AssetPayment>,
    /// Request payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Trigger {
    /// Total native amount, counting a payment denominated in the base asset.
    pub fn base_total(&self) -> Amount {
        match &self.payment {
            Some(p) if p.asset.is_base() => self.base_amount.saturating_add(p.amount),
            _ => self.base_amount,
        }
    }

    /// The attached non-native payment, if any, including a zero amount.
    pub fn custom_payment(&self) -> Option<&AssetPayment> {
        self.payment.as_ref().filter(|p| !p.asset.is_base())
    }
}

/// An outgoing payment emitted by a committed or bounced trigger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Payment {
    pub address: Address,
    pub asset: Asset,
    pub amount: Amount,
}

/// Outcome of a committed trigger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Response {
    /// Human-readable outcome.
    pub message: String,
    /// Response variables, including `message`.
    pub vars: BTreeMap<String, serde_json::Value>,
    /// Payments the host must execute.
    pub payments: Vec<Payment>,
}

impl Response {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut vars = BTreeMap::new();
        vars.insert("message".to_string(), serde_json::Value::from(message.clone()));
        Self {
            message,
            vars,
            payments: Vec::new(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn var(&self, name: &str) -> Option<&serde_json::Value> {
        self.vars.get(name)
    }
}

/// Outcome of an aborted trigger: nothing was written.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bounce {
    /// The contract error string.
    pub error: String,
    /// Refunds owed to the trigger address.
    pub refunds: Vec<Payment>,
}
