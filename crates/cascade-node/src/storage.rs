//! RocksDB-backed persistent contract state.
//!
//! Implements [`StateStore`] using RocksDB column families for contract state,
//! attestations, and metadata. Every committed trigger is written as a single
//! atomic [`WriteBatch`].
//!
//! The `attestations` column family doubles as the node's view of the external
//! attestation service, so [`RocksStateStore`] is also an [`OwnerResolver`].

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};

use cascade_core::error::CascadeError;
use cascade_core::state::{StateStore, StateValue, WriteSet};
use cascade_core::traits::OwnerResolver;
use cascade_core::types::Address;

// --- Column family names ---

const CF_STATE: &str = "state";
const CF_ATTESTATIONS: &str = "attestations";
const CF_METADATA: &str = "metadata";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_STATE, CF_ATTESTATIONS, CF_METADATA];

// --- Metadata keys ---

const META_TRIGGER_COUNT: &[u8] = b"trigger_count";
const META_STATE_ROWS: &[u8] = b"state_rows";

fn storage_err(e: impl std::fmt::Display) -> CascadeError {
    CascadeError::Storage(e.to_string())
}

fn encode_value(value: &StateValue) -> Result<Vec<u8>, CascadeError> {
    bincode::encode_to_vec(value, bincode::config::standard()).map_err(storage_err)
}

fn decode_value(bytes: &[u8]) -> Result<StateValue, CascadeError> {
    let (value, _): (StateValue, usize) =
        bincode::decode_from_slice(bytes, bincode::config::standard()).map_err(storage_err)?;
    Ok(value)
}

/// RocksDB-backed persistent contract state.
pub struct RocksStateStore {
    db: DB,
}

impl RocksStateStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates all column families if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CascadeError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors).map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), CascadeError> {
        self.db.flush().map_err(storage_err)
    }

    /// Number of triggers committed through [`commit`](Self::commit).
    pub fn trigger_count(&self) -> Result<u64, CascadeError> {
        self.get_meta_u64(META_TRIGGER_COUNT)
    }

    /// Number of rows in the `state` column family, kept in `metadata`.
    pub fn state_rows(&self) -> Result<u64, CascadeError> {
        self.get_meta_u64(META_STATE_ROWS)
    }

    /// Apply a committed trigger's writes and bump the trigger counter in
    /// the same batch. Returns the new count.
    pub fn commit(&mut self, writes: WriteSet) -> Result<u64, CascadeError> {
        let count = self.trigger_count()? + 1;
        let mut batch = self.state_batch(writes)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;
        batch.put_cf(cf_meta, META_TRIGGER_COUNT, count.to_le_bytes());
        self.db.write(batch).map_err(storage_err)?;
        Ok(count)
    }

    // --- Attestations ---

    /// Record `address` as the attested controller of `handle`.
    pub fn attest(&self, handle: &str, address: &Address) -> Result<(), CascadeError> {
        let cf = self.cf_handle(CF_ATTESTATIONS)?;
        self.db
            .put_cf(cf, handle.as_bytes(), address.as_str().as_bytes())
            .map_err(storage_err)
    }

    /// Withdraw the attestation for `handle`, returning the previous address.
    pub fn revoke(&self, handle: &str) -> Result<Option<Address>, CascadeError> {
        let previous = self.attested_address(handle)?;
        if previous.is_some() {
            let cf = self.cf_handle(CF_ATTESTATIONS)?;
            self.db.delete_cf(cf, handle.as_bytes()).map_err(storage_err)?;
        }
        Ok(previous)
    }

    // --- Private helpers ---

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, CascadeError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CascadeError::Storage(format!("missing column family: {name}")))
    }

    fn get_meta_u64(&self, key: &[u8]) -> Result<u64, CascadeError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    CascadeError::Storage(format!(
                        "invalid metadata length for {}",
                        String::from_utf8_lossy(key)
                    ))
                })?;
                Ok(u64::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// Build the batch for `writes`, including the updated row counter.
    fn state_batch(&self, writes: WriteSet) -> Result<WriteBatch, CascadeError> {
        let cf = self.cf_handle(CF_STATE)?;
        let mut rows = self.state_rows()?;
        let mut batch = WriteBatch::default();
        for (key, value) in writes {
            let existed = self.db.get_pinned_cf(cf, key.as_bytes()).map_err(storage_err)?.is_some();
            match value {
                Some(value) => {
                    if !existed {
                        rows += 1;
                    }
                    batch.put_cf(cf, key.as_bytes(), encode_value(&value)?);
                }
                None => {
                    if existed {
                        rows = rows.saturating_sub(1);
                    }
                    batch.delete_cf(cf, key.as_bytes());
                }
            }
        }
        let cf_meta = self.cf_handle(CF_METADATA)?;
        batch.put_cf(cf_meta, META_STATE_ROWS, rows.to_le_bytes());
        Ok(batch)
    }
}

impl StateStore for RocksStateStore {
    fn get(&self, key: &str) -> Result<Option<StateValue>, CascadeError> {
        let cf = self.cf_handle(CF_STATE)?;
        self.db
            .get_cf(cf, key.as_bytes())
            .map_err(storage_err)?
            .map(|bytes| decode_value(&bytes))
            .transpose()
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, StateValue)>, CascadeError> {
        let cf = self.cf_handle(CF_STATE)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key_bytes, value_bytes) = item.map_err(storage_err)?;
            if !key_bytes.starts_with(prefix.as_bytes()) {
                break;
            }
            let key = String::from_utf8(key_bytes.into_vec()).map_err(storage_err)?;
            rows.push((key, decode_value(&value_bytes)?));
        }
        Ok(rows)
    }

    fn apply(&mut self, writes: WriteSet) -> Result<(), CascadeError> {
        let batch = self.state_batch(writes)?;
        self.db.write(batch).map_err(storage_err)
    }

    fn len(&self) -> usize {
        self.state_rows().unwrap_or(0) as usize
    }
}

impl OwnerResolver for RocksStateStore {
    fn attested_address(&self, handle: &str) -> Result<Option<Address>, CascadeError> {
        let cf = self.cf_handle(CF_ATTESTATIONS)?;
        match self.db.get_cf(cf, handle.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let s = String::from_utf8(bytes).map_err(storage_err)?;
                s.parse().map(Some).map_err(storage_err)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::state::{StagedState, StateKey};
    use cascade_core::types::{Asset, RepoId};

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Create a temporary RocksStateStore.
    fn temp_store() -> (RocksStateStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStateStore::open(dir.path().join("statedata")).unwrap();
        (store, dir)
    }

    fn repo(s: &str) -> RepoId {
        s.parse().unwrap()
    }

    fn pool_key(r: &str) -> String {
        StateKey::Pool(repo(r), Asset::Base).to_string()
    }

    // ------------------------------------------------------------------
    // State column family
    // ------------------------------------------------------------------

    #[test]
    fn fresh_store_is_empty() {
        let (store, _dir) = temp_store();
        assert!(store.is_empty());
        assert_eq!(store.get("alice/app*pool*base").unwrap(), None);
        assert_eq!(store.trigger_count().unwrap(), 0);
    }

    #[test]
    fn apply_puts_and_deletes() {
        let (mut store, _dir) = temp_store();
        let mut writes = WriteSet::new();
        writes.insert(pool_key("a/a"), Some(StateValue::Amount(10)));
        writes.insert(pool_key("b/b"), Some(StateValue::Amount(20)));
        store.apply(writes).unwrap();
        assert_eq!(store.len(), 2);

        let mut writes = WriteSet::new();
        writes.insert(pool_key("a/a"), None);
        store.apply(writes).unwrap();
        assert_eq!(store.get(&pool_key("a/a")).unwrap(), None);
        assert_eq!(store.get(&pool_key("b/b")).unwrap(), Some(StateValue::Amount(20)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn row_counter_tracks_inserts_only() {
        let (mut store, _dir) = temp_store();
        let mut writes = WriteSet::new();
        writes.insert(pool_key("a/a"), Some(StateValue::Amount(1)));
        writes.insert(pool_key("b/b"), Some(StateValue::Amount(2)));
        store.commit(writes).unwrap();
        assert_eq!(store.state_rows().unwrap(), 2);

        // Overwrites and deletes of absent keys leave the count alone.
        let mut writes = WriteSet::new();
        writes.insert(pool_key("a/a"), Some(StateValue::Amount(5)));
        writes.insert(pool_key("c/c"), None);
        store.commit(writes).unwrap();
        assert_eq!(store.state_rows().unwrap(), 2);

        let mut writes = WriteSet::new();
        writes.insert(pool_key("b/b"), None);
        store.apply(writes).unwrap();
        assert_eq!(store.state_rows().unwrap(), 1);
        assert_eq!(store.scan_prefix("").unwrap().len(), 1);
    }

    #[test]
    fn row_counter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statedata");
        {
            let mut store = RocksStateStore::open(&path).unwrap();
            let mut writes = WriteSet::new();
            writes.insert(pool_key("a/a"), Some(StateValue::Amount(1)));
            store.commit(writes).unwrap();
        }
        let store = RocksStateStore::open(&path).unwrap();
        assert_eq!(store.state_rows().unwrap(), 1);
        assert_eq!(store.trigger_count().unwrap(), 1);
    }

    #[test]
    fn staged_writes_round_trip_typed_values() {
        let (mut store, _dir) = temp_store();
        let r = repo("alice/app");
        let writes = {
            let mut staged = StagedState::new(&store);
            staged.credit_pool(&r, &Asset::Custom("TOKEN".into()), 500).unwrap();
            staged.assign_nickname(&"ADDR".parse().unwrap(), "neo");
            staged.into_writes()
        };
        store.apply(writes).unwrap();

        let staged = StagedState::new(&store);
        assert_eq!(staged.pool(&r, &Asset::Custom("TOKEN".into())).unwrap(), 500);
        assert_eq!(staged.nickname_owner("neo").unwrap().unwrap().as_str(), "ADDR");
    }

    #[test]
    fn scan_prefix_stops_at_prefix_end() {
        let (mut store, _dir) = temp_store();
        let mut writes = WriteSet::new();
        writes.insert("alice/app*pool*base".into(), Some(StateValue::Amount(1)));
        writes.insert("alice/app*total_received*base".into(), Some(StateValue::Amount(2)));
        writes.insert("alice/apq*pool*base".into(), Some(StateValue::Amount(3)));
        writes.insert("zed/x*pool*base".into(), Some(StateValue::Amount(4)));
        store.apply(writes).unwrap();

        let rows = store.scan_prefix("alice/app*").unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["alice/app*pool*base", "alice/app*total_received*base"]);
    }

    #[test]
    fn commit_bumps_trigger_count() {
        let (mut store, _dir) = temp_store();
        let mut writes = WriteSet::new();
        writes.insert(pool_key("a/a"), Some(StateValue::Amount(1)));
        assert_eq!(store.commit(writes).unwrap(), 1);
        assert_eq!(store.commit(WriteSet::new()).unwrap(), 2);
        assert_eq!(store.trigger_count().unwrap(), 2);
    }

    // ------------------------------------------------------------------
    // Attestations
    // ------------------------------------------------------------------

    #[test]
    fn attest_resolves_owner() {
        let (store, _dir) = temp_store();
        store.attest("alice", &"ALICE".parse().unwrap()).unwrap();
        let owner = store.resolve_owner(&repo("alice/app")).unwrap();
        assert_eq!(owner.unwrap().as_str(), "ALICE");
        assert_eq!(store.resolve_owner(&repo("bob/lib")).unwrap(), None);
    }

    #[test]
    fn revoke_returns_previous() {
        let (store, _dir) = temp_store();
        store.attest("alice", &"ALICE".parse().unwrap()).unwrap();
        assert_eq!(store.revoke("alice").unwrap().unwrap().as_str(), "ALICE");
        assert_eq!(store.revoke("alice").unwrap(), None);
        assert_eq!(store.attested_address("alice").unwrap(), None);
    }

    #[test]
    fn attestations_do_not_count_as_state() {
        let (store, _dir) = temp_store();
        store.attest("alice", &"ALICE".parse().unwrap()).unwrap();
        assert!(store.is_empty());
    }
}
