//! Shared test helpers for E2E and property tests.

use serde_json::{json, Value};

use cascade_core::attestation::MemoryAttestations;
use cascade_core::constants::{DEFAULT_DONATION_STORAGE_FEE, DEFAULT_PROCESSING_FEE, DEFAULT_RULES_STORAGE_FEE};
use cascade_core::contract::Contract;
use cascade_core::state::{MemoryStateStore, StagedState, StateStore, StateValue};
use cascade_core::types::{Address, Amount, Asset, AssetPayment, Bounce, RepoId, Response, Trigger};

/// One whole unit in the smallest denomination; keeps halvings exact.
pub const UNIT: Amount = 100_000_000;

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

pub fn repo(s: &str) -> RepoId {
    s.parse().unwrap()
}

pub fn trigger(from: &str, base: Amount, data: Value) -> Trigger {
    Trigger {
        address: addr(from),
        base_amount: base,
        payment: None,
        data,
    }
}

/// A base-asset donation netting exactly `amount` into the pool.
pub fn donate(from: &str, to_repo: &str, amount: Amount) -> Trigger {
    trigger(
        from,
        amount + DEFAULT_DONATION_STORAGE_FEE,
        json!({"donate": 1, "repo": to_repo}),
    )
}

/// A custom-asset donation of `amount`, with the native fees attached.
pub fn donate_asset(from: &str, to_repo: &str, asset: &str, amount: Amount) -> Trigger {
    let mut t = trigger(
        from,
        DEFAULT_PROCESSING_FEE + DEFAULT_DONATION_STORAGE_FEE,
        json!({"donate": 1, "repo": to_repo}),
    );
    t.payment = Some(AssetPayment {
        asset: Asset::Custom(asset.to_string()),
        amount,
    });
    t
}

pub fn set_rules(owner: &str, of_repo: &str, rules: Value) -> Trigger {
    trigger(
        owner,
        DEFAULT_PROCESSING_FEE + DEFAULT_RULES_STORAGE_FEE,
        json!({"set_rules": 1, "repo": of_repo, "rules": rules}),
    )
}

pub fn distribute(from: &str, of_repo: &str) -> Trigger {
    trigger(from, DEFAULT_PROCESSING_FEE, json!({"distribute": 1, "repo": of_repo}))
}

pub fn distribute_asset(from: &str, of_repo: &str, asset: &str) -> Trigger {
    trigger(
        from,
        DEFAULT_PROCESSING_FEE,
        json!({"distribute": 1, "repo": of_repo, "asset": asset}),
    )
}

pub fn nickname(from: &str, name: &str) -> Trigger {
    trigger(from, DEFAULT_PROCESSING_FEE, json!({"nickname": name}))
}

/// In-memory contract, store, and attestation registry.
#[derive(Default)]
pub struct Harness {
    pub contract: Contract,
    pub store: MemoryStateStore,
    pub attest: MemoryAttestations,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attest `address` for `handle`.
    pub fn with_owner(mut self, handle: &str, address: &str) -> Self {
        self.attest.attest(handle, addr(address));
        self
    }

    pub fn run(&mut self, trigger: &Trigger) -> Result<Response, Bounce> {
        self.contract.handle(&mut self.store, &self.attest, trigger)
    }

    pub fn view(&self) -> StagedState<'_, MemoryStateStore> {
        StagedState::new(&self.store)
    }

    pub fn pool(&self, of_repo: &str, asset: &Asset) -> Amount {
        self.view().pool(&repo(of_repo), asset).unwrap()
    }

    pub fn paid(&self, to: &str, asset: &Asset) -> Amount {
        self.view().paid_to(&addr(to), asset).unwrap()
    }

    pub fn unclaimed(&self, of_repo: &str, asset: &Asset) -> Option<Amount> {
        self.view().unclaimed(&repo(of_repo), asset).unwrap()
    }

    /// Every persisted row, for before/after comparisons.
    pub fn snapshot(&self) -> Vec<(String, StateValue)> {
        self.store.scan_prefix("").unwrap()
    }

    /// Sum of all amount rows whose key satisfies `pred`.
    pub fn sum_where(&self, pred: impl Fn(&str) -> bool) -> Amount {
        self.snapshot()
            .into_iter()
            .filter(|(k, _)| pred(k.as_str()))
            .map(|(_, v)| match v {
                StateValue::Amount(a) => a,
                _ => 0,
            })
            .sum()
    }
}
