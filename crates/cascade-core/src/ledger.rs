//! Pool ledger: typed accessors over staged contract state.
//!
//! Every pool row is keyed by (repo, asset) and created lazily on first
//! write. Amount rows read as zero until written, except `unclaimed`, which
//! stays undefined until a distribution first finds no payout address.

use serde::{Deserialize, Serialize};

use crate::error::CascadeError;
use crate::rules::Rules;
use crate::state::{StagedState, StateKey, StateStore, StateValue};
use crate::types::{Address, Amount, Asset, RepoId};

/// Point-in-time view of one (repo, asset) pool.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct PoolSnapshot {
    /// Received but not yet distributed.
    pub pool: Amount,
    /// Lifetime inflow.
    pub total_received: Amount,
    /// Held remainder awaiting a resolvable owner; `None` until first used.
    pub unclaimed: Option<Amount>,
}

fn type_mismatch(key: &StateKey, expected: &str) -> CascadeError {
    CascadeError::Storage(format!("value at {key} is not {expected}"))
}

impl<S: StateStore + ?Sized> StagedState<'_, S> {
    // --- Raw amount rows ---

    fn opt_amount(&self, key: &StateKey) -> Result<Option<Amount>, CascadeError> {
        match self.get(key)? {
            Some(StateValue::Amount(v)) => Ok(Some(v)),
            Some(_) => Err(type_mismatch(key, "an amount")),
            None => Ok(None),
        }
    }

    fn amount(&self, key: &StateKey) -> Result<Amount, CascadeError> {
        Ok(self.opt_amount(key)?.unwrap_or(0))
    }

    fn add_amount(&mut self, key: &StateKey, delta: Amount) -> Result<Amount, CascadeError> {
        let value = self
            .amount(key)?
            .checked_add(delta)
            .ok_or(CascadeError::ArithmeticOverflow)?;
        self.put(key, StateValue::Amount(value));
        Ok(value)
    }

    // --- Pools ---

    pub fn pool(&self, repo: &RepoId, asset: &Asset) -> Result<Amount, CascadeError> {
        self.amount(&StateKey::Pool(repo.clone(), asset.clone()))
    }

    pub fn set_pool(&mut self, repo: &RepoId, asset: &Asset, value: Amount) {
        self.put(&StateKey::Pool(repo.clone(), asset.clone()), StateValue::Amount(value));
    }

    pub fn total_received(&self, repo: &RepoId, asset: &Asset) -> Result<Amount, CascadeError> {
        self.amount(&StateKey::TotalReceived(repo.clone(), asset.clone()))
    }

    /// Add fresh inflow to a pool: `pool` and `total_received` both grow.
    pub fn credit_pool(&mut self, repo: &RepoId, asset: &Asset, amount: Amount) -> Result<Amount, CascadeError> {
        self.add_amount(&StateKey::TotalReceived(repo.clone(), asset.clone()), amount)?;
        self.add_amount(&StateKey::Pool(repo.clone(), asset.clone()), amount)
    }

    pub fn unclaimed(&self, repo: &RepoId, asset: &Asset) -> Result<Option<Amount>, CascadeError> {
        self.opt_amount(&StateKey::Unclaimed(repo.clone(), asset.clone()))
    }

    pub fn set_unclaimed(&mut self, repo: &RepoId, asset: &Asset, value: Amount) {
        self.put(&StateKey::Unclaimed(repo.clone(), asset.clone()), StateValue::Amount(value));
    }

    pub fn pool_snapshot(&self, repo: &RepoId, asset: &Asset) -> Result<PoolSnapshot, CascadeError> {
        Ok(PoolSnapshot {
            pool: self.pool(repo, asset)?,
            total_received: self.total_received(repo, asset)?,
            unclaimed: self.unclaimed(repo, asset)?,
        })
    }

    // --- Edges ---

    /// Record a movement of `amount` from `source` (donor address or repo)
    /// into `target`, on both the forward and the reverse edge.
    pub fn record_edge(&mut self, source: &str, target: &RepoId, asset: &Asset, amount: Amount) -> Result<(), CascadeError> {
        self.add_amount(
            &StateKey::To { source: source.to_string(), target: target.clone(), asset: asset.clone() },
            amount,
        )?;
        self.add_amount(
            &StateKey::From { repo: target.clone(), donor: source.to_string(), asset: asset.clone() },
            amount,
        )?;
        Ok(())
    }

    pub fn forwarded_to(&self, source: &str, target: &RepoId, asset: &Asset) -> Result<Amount, CascadeError> {
        self.amount(&StateKey::To { source: source.to_string(), target: target.clone(), asset: asset.clone() })
    }

    pub fn received_from(&self, repo: &RepoId, donor: &str, asset: &Asset) -> Result<Amount, CascadeError> {
        self.amount(&StateKey::From { repo: repo.clone(), donor: donor.to_string(), asset: asset.clone() })
    }

    // --- Payouts ---

    pub fn paid_to(&self, address: &Address, asset: &Asset) -> Result<Amount, CascadeError> {
        self.amount(&StateKey::PaidTo(address.clone(), asset.clone()))
    }

    pub fn add_paid_to(&mut self, address: &Address, asset: &Asset, amount: Amount) -> Result<Amount, CascadeError> {
        self.add_amount(&StateKey::PaidTo(address.clone(), asset.clone()), amount)
    }

    // --- Rules ---

    pub fn rules(&self, repo: &RepoId) -> Result<Option<Rules>, CascadeError> {
        let key = StateKey::Rules(repo.clone());
        match self.get(&key)? {
            Some(StateValue::Rules(rules)) => Ok(Some(rules)),
            Some(_) => Err(type_mismatch(&key, "a rule set")),
            None => Ok(None),
        }
    }

    pub fn set_rules(&mut self, repo: &RepoId, rules: Rules) {
        self.put(&StateKey::Rules(repo.clone()), StateValue::Rules(rules));
    }

    // --- Nicknames ---

    fn text(&self, key: &StateKey) -> Result<Option<String>, CascadeError> {
        match self.get(key)? {
            Some(StateValue::Text(s)) => Ok(Some(s)),
            Some(_) => Err(type_mismatch(key, "text")),
            None => Ok(None),
        }
    }

    pub fn nickname(&self, address: &Address) -> Result<Option<String>, CascadeError> {
        self.text(&StateKey::Nickname(address.clone()))
    }

    pub fn nickname_owner(&self, name: &str) -> Result<Option<Address>, CascadeError> {
        let key = StateKey::NicknameOwner(name.to_string());
        self.text(&key)?
            .map(|s| s.parse().map_err(|_| type_mismatch(&key, "an address")))
            .transpose()
    }

    pub fn assign_nickname(&mut self, address: &Address, name: &str) {
        self.put(&StateKey::Nickname(address.clone()), StateValue::Text(name.to_string()));
        self.put(&StateKey::NicknameOwner(name.to_string()), StateValue::Text(address.to_string()));
    }

    pub fn release_nickname(&mut self, name: &str) {
        self.delete(&StateKey::NicknameOwner(name.to_string()));
    }
}
