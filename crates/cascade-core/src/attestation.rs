//! In-memory attestation registry.

use std::collections::HashMap;

use crate::error::CascadeError;
use crate::traits::OwnerResolver;
use crate::types::Address;

/// Handle → attested address table, mutated by tests and embedders to play
/// the role of the external attestation service.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttestations {
    handles: HashMap<String, Address>,
}

impl MemoryAttestations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attest `address` as the controller of `handle`, replacing any previous one.
    pub fn attest(&mut self, handle: impl Into<String>, address: Address) {
        self.handles.insert(handle.into(), address);
    }

    /// Withdraw the attestation for `handle`.
    pub fn revoke(&mut self, handle: &str) -> Option<Address> {
        self.handles.remove(handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl OwnerResolver for MemoryAttestations {
    fn attested_address(&self, handle: &str) -> Result<Option<Address>, CascadeError> {
        Ok(self.handles.get(handle).cloned())
    }
}
