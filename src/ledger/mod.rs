//! Layered copy-on-write ledger state.
//!
//! A [`Snapshot`] is a stack of layers. The top layer is owned and mutable; every
//! layer below it is shared and immutable behind an [`Arc`]. Forking freezes the
//! current state into a new parent and starts an empty layer on top, so sibling
//! forks never see each other's writes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::ContractHash;

/// Contract-scoped storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey {
    pub contract: ContractHash,
    pub key: Vec<u8>,
}

impl StorageKey {
    pub fn new(contract: ContractHash, key: impl Into<Vec<u8>>) -> Self {
        Self {
            contract,
            key: key.into(),
        }
    }
}

/// ABI entry of a deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMethod {
    pub name: String,
    pub offset: u32,
    pub parameter_count: usize,
}

/// A deployed contract as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub id: i32,
    pub hash: ContractHash,
    /// Manifest name.
    pub name: String,
    pub script: Vec<u8>,
    pub methods: Vec<ContractMethod>,
}

impl ContractState {
    pub fn method(&self, name: &str, parameter_count: usize) -> Option<&ContractMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameter_count == parameter_count)
    }
}

/// A copy-on-write view over ledger storage and deployed contracts.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    parent: Option<Arc<Snapshot>>,
    /// `None` is a tombstone hiding any value in the parents.
    storage: BTreeMap<StorageKey, Option<Vec<u8>>>,
    contracts: BTreeMap<ContractHash, ContractState>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new empty layer over a frozen copy of this snapshot.
    pub fn fork(&self) -> Snapshot {
        Snapshot {
            parent: Some(Arc::new(self.clone())),
            storage: BTreeMap::new(),
            contracts: BTreeMap::new(),
        }
    }

    /// A new empty layer over an already shared snapshot.
    pub fn fork_shared(base: &Arc<Snapshot>) -> Snapshot {
        Snapshot {
            parent: Some(Arc::clone(base)),
            storage: BTreeMap::new(),
            contracts: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &StorageKey) -> Option<Vec<u8>> {
        let mut layer = Some(self);
        while let Some(current) = layer {
            if let Some(value) = current.storage.get(key) {
                return value.clone();
            }
            layer = current.parent.as_deref();
        }
        None
    }

    pub fn put(&mut self, key: StorageKey, value: Vec<u8>) {
        self.storage.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: StorageKey) {
        self.storage.insert(key, None);
    }

    /// All live entries of `contract` whose key starts with `prefix`, sorted by key.
    pub fn find(&self, contract: &ContractHash, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        // Walk from the bottom layer up so that upper layers override.
        let mut layers = Vec::new();
        let mut layer = Some(self);
        while let Some(current) = layer {
            layers.push(current);
            layer = current.parent.as_deref();
        }

        let start = StorageKey::new(*contract, prefix.to_vec());
        let mut merged: BTreeMap<Vec<u8>, Option<&Vec<u8>>> = BTreeMap::new();
        for current in layers.into_iter().rev() {
            for (key, value) in current.storage.range(start.clone()..) {
                if key.contract != *contract || !key.key.starts_with(prefix) {
                    break;
                }
                merged.insert(key.key.clone(), value.as_ref());
            }
        }
        merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v.clone())))
            .collect()
    }

    pub fn contract(&self, hash: &ContractHash) -> Option<ContractState> {
        let mut layer = Some(self);
        while let Some(current) = layer {
            if let Some(state) = current.contracts.get(hash) {
                return Some(state.clone());
            }
            layer = current.parent.as_deref();
        }
        None
    }

    pub fn deploy(&mut self, contract: ContractState) {
        self.contracts.insert(contract.hash, contract);
    }

    /// Number of layers including this one.
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }

    /// Apply this snapshot's own writes onto `target`.
    ///
    /// Only the top layer is applied; callers commit a fork into the snapshot it
    /// was forked from.
    pub fn commit_into(self, target: &mut Snapshot) {
        target.storage.extend(self.storage);
        target.contracts.extend(self.contracts);
    }

    /// Collapse all layers into a single owned layer.
    pub fn flatten(&self) -> Snapshot {
        let mut layers = Vec::new();
        let mut layer = Some(self);
        while let Some(current) = layer {
            layers.push(current);
            layer = current.parent.as_deref();
        }
        let mut flat = Snapshot::new();
        for current in layers.into_iter().rev() {
            flat.storage
                .extend(current.storage.iter().map(|(k, v)| (k.clone(), v.clone())));
            flat.contracts
                .extend(current.contracts.iter().map(|(k, v)| (*k, v.clone())));
        }
        flat.storage.retain(|_, v| v.is_some());
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> ContractHash {
        ContractHash::from([byte; 20])
    }

    #[test]
    fn forks_do_not_see_each_other() {
        let mut base = Snapshot::new();
        base.put(StorageKey::new(hash(1), b"k".to_vec()), b"v0".to_vec());

        let mut a = base.fork();
        let b = base.fork();
        a.put(StorageKey::new(hash(1), b"k".to_vec()), b"va".to_vec());

        assert_eq!(a.get(&StorageKey::new(hash(1), b"k".to_vec())), Some(b"va".to_vec()));
        assert_eq!(b.get(&StorageKey::new(hash(1), b"k".to_vec())), Some(b"v0".to_vec()));
        assert_eq!(base.get(&StorageKey::new(hash(1), b"k".to_vec())), Some(b"v0".to_vec()));
    }

    #[test]
    fn tombstones_hide_parent_values() {
        let mut base = Snapshot::new();
        base.put(StorageKey::new(hash(1), b"a".to_vec()), b"1".to_vec());
        base.put(StorageKey::new(hash(1), b"b".to_vec()), b"2".to_vec());

        let mut fork = base.fork();
        fork.delete(StorageKey::new(hash(1), b"a".to_vec()));
        fork.put(StorageKey::new(hash(1), b"c".to_vec()), b"3".to_vec());

        assert_eq!(fork.get(&StorageKey::new(hash(1), b"a".to_vec())), None);
        let found = fork.find(&hash(1), b"");
        assert_eq!(
            found,
            vec![(b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())]
        );
    }

    #[test]
    fn find_respects_contract_and_prefix() {
        let mut snapshot = Snapshot::new();
        snapshot.put(StorageKey::new(hash(1), b"user:1".to_vec()), b"a".to_vec());
        snapshot.put(StorageKey::new(hash(1), b"user:2".to_vec()), b"b".to_vec());
        snapshot.put(StorageKey::new(hash(1), b"zzz".to_vec()), b"c".to_vec());
        snapshot.put(StorageKey::new(hash(2), b"user:3".to_vec()), b"d".to_vec());

        let found = snapshot.fork().find(&hash(1), b"user:");
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|(k, _)| k.starts_with(b"user:")));
    }

    #[test]
    fn commit_applies_top_layer() {
        let mut base = Snapshot::new();
        let mut fork = base.fork();
        fork.put(StorageKey::new(hash(1), b"k".to_vec()), b"v".to_vec());
        fork.commit_into(&mut base);
        assert_eq!(base.get(&StorageKey::new(hash(1), b"k".to_vec())), Some(b"v".to_vec()));
    }

    #[test]
    fn flatten_preserves_visible_state() {
        let mut base = Snapshot::new();
        base.put(StorageKey::new(hash(1), b"a".to_vec()), b"1".to_vec());
        let mut fork = base.fork();
        fork.delete(StorageKey::new(hash(1), b"a".to_vec()));
        fork.put(StorageKey::new(hash(1), b"b".to_vec()), b"2".to_vec());

        let flat = fork.flatten();
        assert_eq!(flat.depth(), 1);
        assert_eq!(flat.find(&hash(1), b""), fork.find(&hash(1), b""));
    }
}
