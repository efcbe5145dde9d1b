//! Percentage-split rule sets and the owner-gated `set_rules` operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::contract::FeeSchedule;
use crate::error::{AuthError, CascadeError, FeeError};
use crate::state::{StagedState, StateStore};
use crate::traits::OwnerResolver;
use crate::types::{Address, Amount, Percent, RepoId, Response};
use crate::validation;

/// A validated rule set: target repo → share, in distribution order.
///
/// Only [`validation::validate_rules`] builds non-empty rule sets, so every
/// instance satisfies the entry-count, self-reference and total invariants.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Rules(BTreeMap<RepoId, Percent>);

impl Rules {
    pub(crate) fn from_map(map: BTreeMap<RepoId, Percent>) -> Self {
        Self(map)
    }

    /// Rule set that keeps everything for the owner.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, target: &RepoId) -> Option<Percent> {
        self.0.get(target).copied()
    }

    /// Entries in distribution order.
    pub fn iter(&self) -> impl Iterator<Item = (&RepoId, &Percent)> {
        self.0.iter()
    }

    /// Sum of all shares.
    pub fn total(&self) -> Percent {
        Percent::from_units(self.0.values().map(Percent::units).sum())
    }

    /// Split `available` across the rule targets.
    ///
    /// Zero-amount shares are omitted. The remainder includes every unit
    /// lost to rounding, so `forwarded + remainder == available` always.
    ///
    /// # Examples
    ///
    /// ```
    /// use cascade_core::validation::validate_rules;
    /// let own = "alice/app".parse().unwrap();
    /// let rules = validate_rules(
    ///     &serde_json::json!({"repo/1": 5, "repo/2": 10, "repo/3": 15}),
    ///     &own,
    /// ).unwrap();
    /// let split = rules.split(100);
    /// assert_eq!(split.forwarded(), 30);
    /// assert_eq!(split.remainder, 70);
    /// ```
    pub fn split(&self, available: Amount) -> Split {
        let shares: Vec<(RepoId, Amount)> = self
            .0
            .iter()
            .map(|(target, pct)| (target.clone(), pct.apply(available)))
            .filter(|(_, amount)| *amount > 0)
            .collect();
        // Shares sum to at most 100 %, each rounded down.
        let forwarded: Amount = shares.iter().map(|(_, a)| a).sum();
        Split {
            shares,
            remainder: available - forwarded,
        }
    }
}

/// Result of applying a rule set to an amount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    /// Non-zero forwards in distribution order.
    pub shares: Vec<(RepoId, Amount)>,
    /// Unshared portion, retained for the owner.
    pub remainder: Amount,
}

impl Split {
    pub fn forwarded(&self) -> Amount {
        self.shares.iter().map(|(_, a)| a).sum()
    }
}

/// Replace the rule set of `repo`.
///
/// The caller must currently be the attested owner of the repo's owner
/// handle. A missing or `null` rule map stores an empty rule set.
pub fn set_rules<S: StateStore + ?Sized>(
    state: &mut StagedState<'_, S>,
    resolver: &dyn OwnerResolver,
    fees: &FeeSchedule,
    caller: &Address,
    base_attached: Amount,
    repo: &RepoId,
    raw: Option<&Value>,
) -> Result<Response, CascadeError> {
    let owner = resolver.resolve_owner(repo)?;
    if owner.as_ref() != Some(caller) {
        return Err(AuthError::NotAttested {
            address: caller.to_string(),
            owner: repo.owner().to_string(),
        }
        .into());
    }

    let rules = match raw {
        None | Some(Value::Null) => Rules::empty(),
        Some(raw) => validation::validate_rules(raw, repo)?,
    };

    if base_attached < fees.processing_fee.saturating_add(fees.rules_storage_fee) {
        return Err(FeeError::RulesStorageFee.into());
    }

    debug!(%repo, recipients = rules.len(), total = %rules.total(), "storing rules");
    state.set_rules(repo, rules);
    Ok(Response::new(format!("Rules for {repo} are set")))
}
