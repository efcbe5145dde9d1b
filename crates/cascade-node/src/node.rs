//! Node composition.
//!
//! The [`Node`] owns the RocksDB store and the [`Contract`]. Triggers are
//! serialized by holding the store's write lock across execute and commit;
//! queries take the read lock and never observe a half-applied trigger.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use cascade_core::contract::{Contract, FeeSchedule};
use cascade_core::error::CascadeError;
use cascade_core::ledger::PoolSnapshot;
use cascade_core::rules::Rules;
use cascade_core::state::{StagedState, StateStore};
use cascade_core::types::{Address, Asset, Bounce, RepoId, Response, Trigger};

use crate::config::NodeConfig;
use crate::storage::RocksStateStore;

/// The settlement node, composing storage and the contract.
pub struct Node {
    /// RocksDB storage behind a read-write lock.
    storage: Arc<RwLock<RocksStateStore>>,
    /// Trigger dispatcher configured with the node's fee schedule.
    contract: Contract,
    /// Node configuration.
    config: NodeConfig,
}

impl Node {
    /// Create a node with the given configuration, opening its storage.
    pub fn new(config: NodeConfig) -> Result<Arc<Self>, CascadeError> {
        let store = RocksStateStore::open(config.db_path())?;
        let storage = Arc::new(RwLock::new(store));
        let contract = Contract::new(config.fees.clone());

        info!(path = %config.db_path().display(), "opened state store");

        Ok(Arc::new(Self {
            storage,
            contract,
            config,
        }))
    }

    /// Execute one trigger and persist its effects atomically.
    ///
    /// A bounced trigger writes nothing. A storage failure while committing
    /// is reported as a bounce as well.
    pub fn submit_trigger(&self, trigger: &Trigger) -> Result<Response, Bounce> {
        let mut store = self.storage.write();
        let (response, writes) = self.contract.execute(&*store, &*store, trigger)?;
        let rows = writes.len();
        let count = store
            .commit(writes)
            .map_err(|err| self.contract.bounce(trigger, &err))?;
        debug!(count, rows, "committed trigger");
        Ok(response)
    }

    // --- Query methods for RPC ---

    /// A single state variable rendered as JSON.
    pub fn get_state_var(&self, key: &str) -> Result<Option<Value>, CascadeError> {
        let store = self.storage.read();
        Ok(store.get(key)?.map(|v| v.to_json()))
    }

    /// All state variables whose key starts with `prefix`, rendered as JSON.
    pub fn get_state_vars(&self, prefix: &str) -> Result<BTreeMap<String, Value>, CascadeError> {
        let store = self.storage.read();
        Ok(store
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(k, v)| (k, v.to_json()))
            .collect())
    }

    /// Pool, lifetime inflow, and unclaimed amount of one (repo, asset) pair.
    pub fn pool(&self, repo: &RepoId, asset: &Asset) -> Result<PoolSnapshot, CascadeError> {
        let store = self.storage.read();
        StagedState::new(&*store).pool_snapshot(repo, asset)
    }

    /// Current rule set of `repo`, if any.
    pub fn rules(&self, repo: &RepoId) -> Result<Option<Rules>, CascadeError> {
        let store = self.storage.read();
        StagedState::new(&*store).rules(repo)
    }

    /// Record an attestation from the external attestation service.
    pub fn attest(&self, handle: &str, address: &Address) -> Result<(), CascadeError> {
        self.storage.read().attest(handle, address)?;
        info!(handle, %address, "attestation recorded");
        Ok(())
    }

    /// Withdraw an attestation.
    pub fn revoke(&self, handle: &str) -> Result<Option<Address>, CascadeError> {
        let previous = self.storage.read().revoke(handle)?;
        info!(handle, revoked = previous.is_some(), "attestation revoked");
        Ok(previous)
    }

    /// Number of committed triggers.
    pub fn trigger_count(&self) -> Result<u64, CascadeError> {
        self.storage.read().trigger_count()
    }

    /// Number of persisted state variables.
    pub fn state_len(&self) -> Result<u64, CascadeError> {
        self.storage.read().state_rows()
    }

    /// Flush storage buffers to disk.
    pub fn flush(&self) -> Result<(), CascadeError> {
        self.storage.read().flush()
    }

    /// Fee schedule the contract runs with.
    pub fn fees(&self) -> &FeeSchedule {
        self.contract.fees()
    }

    /// Node configuration reference.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}
