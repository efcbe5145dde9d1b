//! Contract state storage interface, key space, and staged overlay.
//!
//! Provides the [`StateStore`] trait for persistent key-value contract state.
//! The [`MemoryStateStore`] is suitable for testing; the production node uses
//! RocksDB (cascade-node).
//!
//! Operations never write to a store directly. They run against a
//! [`StagedState`] overlay and hand back its [`WriteSet`], which the caller
//! applies with a single [`StateStore::apply`] only when the whole trigger
//! succeeded. A failed trigger simply drops its overlay.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{KEY_SEPARATOR, PERCENT_PRECISION};
use crate::error::CascadeError;
use crate::rules::Rules;
use crate::types::{Address, Amount, Asset, RepoId};

/// A typed persisted state key.
///
/// Rendered with `*` separators, e.g. `alice/app*pool*base`. The rendered
/// form is the storage key and the read-only query key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// `<repo>*rules`
    Rules(RepoId),
    /// `<repo>*pool*<asset>`
    Pool(RepoId, Asset),
    /// `<repo>*total_received*<asset>`
    TotalReceived(RepoId, Asset),
    /// `<repo>*unclaimed*<asset>`
    Unclaimed(RepoId, Asset),
    /// `<source>*to*<target>*<asset>`: cumulative amount moved from a donor
    /// address or a repo into `target`.
    To { source: String, target: RepoId, asset: Asset },
    /// `<repo>*from*<donor>*<asset>`: reverse edge of [`StateKey::To`].
    From { repo: RepoId, donor: String, asset: Asset },
    /// `paid_to*<address>*<asset>`
    PaidTo(Address, Asset),
    /// `nickname*<address>`
    Nickname(Address),
    /// `nickname_owner*<nickname>`
    NicknameOwner(String),
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = KEY_SEPARATOR;
        match self {
            Self::Rules(repo) => write!(f, "{repo}{s}rules"),
            Self::Pool(repo, asset) => write!(f, "{repo}{s}pool{s}{asset}"),
            Self::TotalReceived(repo, asset) => write!(f, "{repo}{s}total_received{s}{asset}"),
            Self::Unclaimed(repo, asset) => write!(f, "{repo}{s}unclaimed{s}{asset}"),
            Self::To { source, target, asset } => write!(f, "{source}{s}to{s}{target}{s}{asset}"),
            Self::From { repo, donor, asset } => write!(f, "{repo}{s}from{s}{donor}{s}{asset}"),
            Self::PaidTo(address, asset) => write!(f, "paid_to{s}{address}{s}{asset}"),
            Self::Nickname(address) => write!(f, "nickname{s}{address}"),
            Self::NicknameOwner(name) => write!(f, "nickname_owner{s}{name}"),
        }
    }
}

/// A persisted state value.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum StateValue {
    Amount(Amount),
    Rules(Rules),
    Text(String),
}

impl StateValue {
    /// JSON rendering for read-only queries. Rule shares are shown in percent.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Amount(v) => serde_json::Value::from(*v),
            Self::Text(s) => serde_json::Value::from(s.clone()),
            Self::Rules(rules) => {
                let map: serde_json::Map<String, serde_json::Value> = rules
                    .iter()
                    .map(|(repo, pct)| {
                        let value = pct.units() as f64 / PERCENT_PRECISION as f64;
                        (repo.to_string(), serde_json::Value::from(value))
                    })
                    .collect();
                serde_json::Value::Object(map)
            }
        }
    }
}

/// Pending mutations of one trigger. `None` deletes the key.
pub type WriteSet = BTreeMap<String, Option<StateValue>>;

/// Persistent contract state.
///
/// Not thread-safe by itself; callers serialize triggers (the node wraps the
/// store in a lock) so each [`apply`](StateStore::apply) is one atomic,
/// totally ordered state transition.
pub trait StateStore: Send + Sync {
    /// Look up a value by rendered key. Returns `None` if never written.
    fn get(&self, key: &str) -> Result<Option<StateValue>, CascadeError>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, StateValue)>, CascadeError>;

    /// Atomically apply a trigger's write set.
    fn apply(&mut self, writes: WriteSet) -> Result<(), CascadeError>;

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// Whether nothing has been stored yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory contract state for testing and embedding.
///
/// No persistence, unbounded growth.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    entries: BTreeMap<String, StateValue>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<StateValue>, CascadeError> {
        Ok(self.entries.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, StateValue)>, CascadeError> {
        Ok(self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply(&mut self, writes: WriteSet) -> Result<(), CascadeError> {
        for (key, value) in writes {
            match value {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Copy-on-write view of a store for the duration of one trigger.
///
/// Reads see the trigger's own pending writes first, then the store.
pub struct StagedState<'a, S: StateStore + ?Sized> {
    base: &'a S,
    writes: WriteSet,
}

impl<'a, S: StateStore + ?Sized> StagedState<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            writes: WriteSet::new(),
        }
    }

    /// Read through the overlay.
    pub fn get(&self, key: &StateKey) -> Result<Option<StateValue>, CascadeError> {
        let rendered = key.to_string();
        match self.writes.get(&rendered) {
            Some(pending) => Ok(pending.clone()),
            None => self.base.get(&rendered),
        }
    }

    pub fn put(&mut self, key: &StateKey, value: StateValue) {
        self.writes.insert(key.to_string(), Some(value));
    }

    pub fn delete(&mut self, key: &StateKey) {
        self.writes.insert(key.to_string(), None);
    }

    /// Number of pending writes.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Consume the overlay, yielding the writes to commit.
    pub fn into_writes(self) -> WriteSet {
        self.writes
    }
}
