//! Donation intake.
//!
//! Donations only fill a repo's pool. Rules are applied later, when someone
//! calls `distribute`, so a repo without rules can still collect donations.

use tracing::debug;

use crate::contract::FeeSchedule;
use crate::error::{CascadeError, FeeError};
use crate::state::{StagedState, StateStore};
use crate::types::{Address, Amount, Asset, AssetPayment, RepoId, Response};

/// Record a donation from `donor` into `repo`.
///
/// For native donations the storage fee is taken out of the payment itself.
/// For custom-asset donations the native attachment must cover it separately
/// and the whole custom amount is donated. Either way the native attachment
/// must also cover the processing fee.
pub fn donate<S: StateStore + ?Sized>(
    state: &mut StagedState<'_, S>,
    fees: &FeeSchedule,
    donor: &Address,
    repo: &RepoId,
    base_attached: Amount,
    custom: Option<&AssetPayment>,
) -> Result<Response, CascadeError> {
    let required = fees.processing_fee.saturating_add(fees.donation_storage_fee);
    if base_attached < required {
        return Err(FeeError::StorageFee.into());
    }

    let (asset, donated) = match custom {
        Some(payment) => (payment.asset.clone(), payment.amount),
        None => (Asset::Base, base_attached - fees.donation_storage_fee),
    };
    if donated == 0 {
        return Err(FeeError::StorageFee.into());
    }

    let pool = state.credit_pool(repo, &asset, donated)?;
    state.record_edge(donor.as_str(), repo, &asset, donated)?;
    debug!(%repo, %asset, donated, pool, "donation recorded");

    Ok(Response::new(format!("Successful donation to {repo}"))
        .with_var(format!("donated_in_{}", asset.label()), donated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;

    fn repo(s: &str) -> RepoId {
        s.parse().unwrap()
    }

    fn donor() -> Address {
        "DONOR".parse().unwrap()
    }

    #[test]
    fn base_donation_deducts_storage_fee() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        let fees = FeeSchedule::default();
        let r = repo("alice/app");

        let resp = donate(&mut staged, &fees, &donor(), &r, 100_000 + fees.donation_storage_fee, None).unwrap();
        assert_eq!(resp.message, "Successful donation to alice/app");
        assert_eq!(resp.var("donated_in_base").unwrap(), 100_000);
        assert!(resp.payments.is_empty());

        let snap = staged.pool_snapshot(&r, &Asset::Base).unwrap();
        assert_eq!(snap.pool, 100_000);
        assert_eq!(snap.total_received, 100_000);
        assert_eq!(staged.forwarded_to("DONOR", &r, &Asset::Base).unwrap(), 100_000);
        assert_eq!(staged.received_from(&r, "DONOR", &Asset::Base).unwrap(), 100_000);
    }

    #[test]
    fn custom_donation_keeps_full_amount() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        let fees = FeeSchedule::default();
        let token = Asset::Custom("TOKEN".into());
        let payment = AssetPayment { asset: token.clone(), amount: 5_000 };

        let resp = donate(
            &mut staged, &fees, &donor(), &repo("alice/app"),
            fees.processing_fee + fees.donation_storage_fee, Some(&payment),
        )
        .unwrap();
        assert_eq!(resp.var("donated_in_TOKEN").unwrap(), 5_000);
        assert_eq!(staged.pool(&repo("alice/app"), &token).unwrap(), 5_000);
        assert_eq!(staged.pool(&repo("alice/app"), &Asset::Base).unwrap(), 0);
    }

    #[test]
    fn custom_donation_without_fee_rejected() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        let fees = FeeSchedule::default();
        let payment = AssetPayment { asset: Asset::Custom("TOKEN".into()), amount: 5_000 };

        let err = donate(&mut staged, &fees, &donor(), &repo("alice/app"), fees.processing_fee, Some(&payment))
            .unwrap_err();
        assert_eq!(err.to_string(), "Not enough fee to pay storage");
        assert_eq!(staged.pending(), 0);
    }

    #[test]
    fn donations_accumulate_without_rules() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        let fees = FeeSchedule::default();
        let r = repo("nobody/yet");
        for _ in 0..3 {
            donate(&mut staged, &fees, &donor(), &r, 20_000, None).unwrap();
        }
        assert_eq!(staged.pool(&r, &Asset::Base).unwrap(), 3 * (20_000 - fees.donation_storage_fee));
        assert_eq!(staged.rules(&r).unwrap(), None);
    }
}
