//! Trait interfaces for external collaborators.
//!
//! - [`OwnerResolver`]: attested-owner lookups (the attestation service;
//!   `MemoryAttestations` in core, the RocksDB feed in cascade-node)
//!
//! Persistent state is abstracted by [`StateStore`](crate::state::StateStore).

use crate::error::CascadeError;
use crate::types::{Address, RepoId};

/// Point-in-time view of the external attestation service.
///
/// Every call is a fresh lookup; the contract never caches answers, so a
/// change of controller between two distributions redirects the payout.
pub trait OwnerResolver: Send + Sync {
    /// Address currently attested as controlling the account `handle`.
    fn attested_address(&self, handle: &str) -> Result<Option<Address>, CascadeError>;

    /// Attested owner of a repo, i.e. of its owner handle.
    ///
    /// Default implementation delegates to
    /// [`attested_address`](Self::attested_address).
    fn resolve_owner(&self, repo: &RepoId) -> Result<Option<Address>, CascadeError> {
        self.attested_address(repo.owner())
    }
}
