//! Distribution engine: one settlement pass over a repo's pool for one asset.
//!
//! A pass empties the pool, re-seeds each rule target's own pool with its
//! share, and pays the unshared remainder (plus any held unclaimed amount) to
//! the repo's attested owner or an explicit override address. Targets are
//! never distributed recursively; each repo is flushed by its own call, which
//! is what lets cycles such as A→B→C→A shrink geometrically across calls.
//!
//! `distribute` is public: anyone may flush any repo.

use tracing::{debug, warn};

use crate::error::{CascadeError, StateError};
use crate::state::{StagedState, StateStore};
use crate::traits::OwnerResolver;
use crate::types::{Address, Asset, Payment, RepoId, Response};

/// Flush `repo`'s pool in `asset`.
///
/// # Errors
///
/// - [`StateError::RulesNotSet`] if the repo never had rules set
/// - [`StateError::NothingToDistribute`] if both pool and unclaimed are zero
pub fn distribute<S: StateStore + ?Sized>(
    state: &mut StagedState<'_, S>,
    resolver: &dyn OwnerResolver,
    repo: &RepoId,
    asset: &Asset,
    override_to: Option<&Address>,
) -> Result<Response, CascadeError> {
    let rules = state
        .rules(repo)?
        .ok_or_else(|| StateError::RulesNotSet(repo.to_string()))?;

    let available = state.pool(repo, asset)?;
    let held = state.unclaimed(repo, asset)?;
    if available == 0 && held.unwrap_or(0) == 0 {
        return Err(StateError::NothingToDistribute {
            repo: repo.to_string(),
            asset: asset.label().to_string(),
        }
        .into());
    }

    state.set_pool(repo, asset, 0);

    let split = rules.split(available);
    for (target, amount) in &split.shares {
        let pool = state.credit_pool(target, asset, *amount)?;
        state.record_edge(repo.as_str(), target, asset, *amount)?;
        debug!(from = %repo, to = %target, %asset, amount, pool, "forwarded share");
    }

    let remainder = match held {
        Some(held) => {
            state.set_unclaimed(repo, asset, 0);
            split
                .remainder
                .checked_add(held)
                .ok_or(CascadeError::ArithmeticOverflow)?
        }
        None => split.remainder,
    };

    let mut response = Response::new(format!(
        "Distribution for repo {repo} in asset {} done",
        asset.label()
    ))
    .with_var("asset", asset.label());

    if remainder == 0 {
        return Ok(response);
    }

    let claimer = match override_to {
        Some(address) => Some(address.clone()),
        None => resolver.resolve_owner(repo)?,
    };

    match claimer {
        Some(address) => {
            state.add_paid_to(&address, asset, remainder)?;
            debug!(%repo, %asset, claimer = %address, remainder, "paid remainder");
            response = response
                .with_var("claimer", address.as_str())
                .with_var("claimed", remainder)
                .with_payment(Payment {
                    address,
                    asset: asset.clone(),
                    amount: remainder,
                });
        }
        None => {
            // `remainder` already includes the previously held amount.
            state.set_unclaimed(repo, asset, remainder);
            warn!(%repo, %asset, remainder, "no attested owner; holding remainder as unclaimed");
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::MemoryAttestations;
    use crate::state::MemoryStateStore;
    use crate::validation::validate_rules;
    use serde_json::json;

    fn repo(s: &str) -> RepoId {
        s.parse().unwrap()
    }

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    /// Commit `f`'s writes to the store, like a successful trigger.
    fn commit<F>(store: &mut MemoryStateStore, f: F) -> Result<Response, CascadeError>
    where
        F: FnOnce(&mut StagedState<'_, MemoryStateStore>) -> Result<Response, CascadeError>,
    {
        let mut staged = StagedState::new(&*store);
        let resp = f(&mut staged)?;
        let writes = staged.into_writes();
        store.apply(writes)?;
        Ok(resp)
    }

    fn with_rules(store: &mut MemoryStateStore, r: &str, raw: serde_json::Value) {
        let r = repo(r);
        let rules = validate_rules(&raw, &r).unwrap();
        commit(store, |s| {
            s.set_rules(&r, rules);
            Ok(Response::default())
        })
        .unwrap();
    }

    fn fund(store: &mut MemoryStateStore, r: &str, asset: &Asset, amount: u64) {
        let r = repo(r);
        commit(store, |s| {
            s.credit_pool(&r, asset, amount)?;
            Ok(Response::default())
        })
        .unwrap();
    }

    fn view(store: &MemoryStateStore) -> StagedState<'_, MemoryStateStore> {
        StagedState::new(store)
    }

    #[test]
    fn rules_required() {
        let mut store = MemoryStateStore::new();
        fund(&mut store, "alice/app", &Asset::Base, 100);
        let attest = MemoryAttestations::new();
        let err = commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, None))
            .unwrap_err();
        assert_eq!(err.to_string(), "Rules for repo alice/app are not set yet");
        assert_eq!(view(&store).pool(&repo("alice/app"), &Asset::Base).unwrap(), 100);
    }

    #[test]
    fn empty_pool_rejected() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "alice/app", json!({}));
        let attest = MemoryAttestations::new();
        let err = commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, None))
            .unwrap_err();
        assert_eq!(err.to_string(), "Nothing to distribute in repo alice/app for asset base");
    }

    #[test]
    fn percentage_split_pays_owner_remainder() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "alice/app", json!({"repo/1": 5, "repo/2": 10, "repo/3": 15}));
        fund(&mut store, "alice/app", &Asset::Base, 100);
        let mut attest = MemoryAttestations::new();
        attest.attest("alice", addr("ALICE"));

        let resp = commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, None)).unwrap();
        assert_eq!(resp.message, "Distribution for repo alice/app in asset base done");
        assert_eq!(resp.var("asset").unwrap(), "base");
        assert_eq!(resp.var("claimer").unwrap(), "ALICE");
        assert_eq!(resp.var("claimed").unwrap(), 70);
        assert_eq!(
            resp.payments,
            vec![Payment { address: addr("ALICE"), asset: Asset::Base, amount: 70 }]
        );

        let v = view(&store);
        let src = repo("alice/app");
        for (target, amount) in [("repo/1", 5), ("repo/2", 10), ("repo/3", 15)] {
            let t = repo(target);
            assert_eq!(v.pool(&t, &Asset::Base).unwrap(), amount);
            assert_eq!(v.total_received(&t, &Asset::Base).unwrap(), amount);
            assert_eq!(v.forwarded_to(src.as_str(), &t, &Asset::Base).unwrap(), amount);
        }
        assert_eq!(v.pool(&src, &Asset::Base).unwrap(), 0);
        assert_eq!(v.paid_to(&addr("ALICE"), &Asset::Base).unwrap(), 70);
        assert_eq!(v.unclaimed(&src, &Asset::Base).unwrap(), None);
    }

    #[test]
    fn second_distribution_has_nothing_left() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "alice/app", json!({"bob/lib": 50}));
        fund(&mut store, "alice/app", &Asset::Base, 100);
        let mut attest = MemoryAttestations::new();
        attest.attest("alice", addr("ALICE"));

        commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, None)).unwrap();
        let err = commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, None))
            .unwrap_err();
        assert!(matches!(err, CascadeError::State(StateError::NothingToDistribute { .. })));
    }

    #[test]
    fn unresolved_owner_holds_remainder_then_pays_lump_sum() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "alice/app", json!({"bob/lib": 50}));
        fund(&mut store, "alice/app", &Asset::Base, 100);
        let mut attest = MemoryAttestations::new();
        let src = repo("alice/app");

        let resp = commit(&mut store, |s| distribute(s, &attest, &src, &Asset::Base, None)).unwrap();
        assert!(resp.var("claimer").is_none());
        assert!(resp.var("claimed").is_none());
        assert!(resp.payments.is_empty());
        assert_eq!(view(&store).unclaimed(&src, &Asset::Base).unwrap(), Some(50));
        assert_eq!(view(&store).pool(&src, &Asset::Base).unwrap(), 0);

        // Unclaimed alone is enough to distribute again, still unresolved.
        commit(&mut store, |s| distribute(s, &attest, &src, &Asset::Base, None)).unwrap();
        assert_eq!(view(&store).unclaimed(&src, &Asset::Base).unwrap(), Some(50));

        fund(&mut store, "alice/app", &Asset::Base, 20);
        attest.attest("alice", addr("ALICE"));
        let resp = commit(&mut store, |s| distribute(s, &attest, &src, &Asset::Base, None)).unwrap();
        assert_eq!(resp.var("claimed").unwrap(), 60);
        let v = view(&store);
        assert_eq!(v.unclaimed(&src, &Asset::Base).unwrap(), Some(0));
        assert_eq!(v.paid_to(&addr("ALICE"), &Asset::Base).unwrap(), 60);
        assert_eq!(v.pool(&repo("bob/lib"), &Asset::Base).unwrap(), 60);
    }

    #[test]
    fn override_address_needs_no_attestation() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "alice/app", json!({}));
        fund(&mut store, "alice/app", &Asset::Base, 42);
        let attest = MemoryAttestations::new();
        let to = addr("ELSEWHERE");

        let resp = commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, Some(&to))).unwrap();
        assert_eq!(resp.var("claimer").unwrap(), "ELSEWHERE");
        assert_eq!(view(&store).paid_to(&to, &Asset::Base).unwrap(), 42);
    }

    #[test]
    fn full_forward_skips_payout() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "alice/app", json!({"bob/lib": 100}));
        fund(&mut store, "alice/app", &Asset::Base, 80);
        let mut attest = MemoryAttestations::new();
        attest.attest("alice", addr("ALICE"));

        let resp = commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, None)).unwrap();
        assert_eq!(resp.message, "Distribution for repo alice/app in asset base done");
        assert!(resp.var("claimer").is_none());
        assert!(resp.payments.is_empty());
        assert_eq!(view(&store).pool(&repo("bob/lib"), &Asset::Base).unwrap(), 80);
        assert_eq!(view(&store).paid_to(&addr("ALICE"), &Asset::Base).unwrap(), 0);
    }

    #[test]
    fn owner_change_redirects_payout() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "alice/app", json!({}));
        let mut attest = MemoryAttestations::new();
        attest.attest("alice", addr("OLD"));
        fund(&mut store, "alice/app", &Asset::Base, 10);
        commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, None)).unwrap();

        attest.attest("alice", addr("NEW"));
        fund(&mut store, "alice/app", &Asset::Base, 30);
        commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &Asset::Base, None)).unwrap();

        let v = view(&store);
        assert_eq!(v.paid_to(&addr("OLD"), &Asset::Base).unwrap(), 10);
        assert_eq!(v.paid_to(&addr("NEW"), &Asset::Base).unwrap(), 30);
    }

    #[test]
    fn custom_asset_leaves_base_untouched() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "alice/app", json!({"bob/lib": 10}));
        let token = Asset::Custom("TOKEN".into());
        fund(&mut store, "alice/app", &Asset::Base, 500);
        fund(&mut store, "alice/app", &token, 1_000);
        let mut attest = MemoryAttestations::new();
        attest.attest("alice", addr("ALICE"));

        let resp = commit(&mut store, |s| distribute(s, &attest, &repo("alice/app"), &token, None)).unwrap();
        assert_eq!(resp.message, "Distribution for repo alice/app in asset TOKEN done");
        assert_eq!(resp.payments[0].asset, token);

        let v = view(&store);
        assert_eq!(v.pool(&repo("alice/app"), &Asset::Base).unwrap(), 500);
        assert_eq!(v.pool(&repo("bob/lib"), &Asset::Base).unwrap(), 0);
        assert_eq!(v.pool(&repo("bob/lib"), &token).unwrap(), 100);
        assert_eq!(v.paid_to(&addr("ALICE"), &Asset::Base).unwrap(), 0);
        assert_eq!(v.paid_to(&addr("ALICE"), &token).unwrap(), 900);
    }

    #[test]
    fn three_repo_cycle_spirals_down() {
        let mut store = MemoryStateStore::new();
        with_rules(&mut store, "a/a", json!({"b/b": 50}));
        with_rules(&mut store, "b/b", json!({"c/c": 50}));
        with_rules(&mut store, "c/c", json!({"a/a": 50}));
        let mut attest = MemoryAttestations::new();
        for h in ["a", "b", "c"] {
            attest.attest(h, addr(&h.to_uppercase()));
        }
        const UNIT: u64 = 100_000_000;
        fund(&mut store, "a/a", &Asset::Base, 100 * UNIT);

        let round = |store: &mut MemoryStateStore| {
            for r in ["a/a", "b/b", "c/c"] {
                commit(store, |s| distribute(s, &attest, &repo(r), &Asset::Base, None)).unwrap();
            }
        };

        round(&mut store);
        {
            let v = view(&store);
            assert_eq!(v.paid_to(&addr("A"), &Asset::Base).unwrap(), 50 * UNIT);
            assert_eq!(v.paid_to(&addr("B"), &Asset::Base).unwrap(), 25 * UNIT);
            assert_eq!(v.paid_to(&addr("C"), &Asset::Base).unwrap(), 12 * UNIT + UNIT / 2);
            assert_eq!(v.pool(&repo("a/a"), &Asset::Base).unwrap(), 12 * UNIT + UNIT / 2);
        }

        round(&mut store);
        let v = view(&store);
        assert_eq!(v.paid_to(&addr("A"), &Asset::Base).unwrap(), 5_625_000_000);
        assert_eq!(v.paid_to(&addr("B"), &Asset::Base).unwrap(), 2_812_500_000);
        assert_eq!(v.paid_to(&addr("C"), &Asset::Base).unwrap(), 1_406_250_000);
    }
}
