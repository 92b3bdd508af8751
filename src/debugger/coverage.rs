use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::types::ContractHash;

/// Per-contract instruction hit flags.
#[derive(Debug, Default)]
pub struct CoverageTracker {
    coverage: RwLock<HashMap<ContractHash, BTreeMap<u32, bool>>>,
}

impl CoverageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `offsets`, all unhit. Replaces existing coverage.
    pub fn seed(&self, contract: ContractHash, offsets: impl IntoIterator<Item = u32>) {
        let map = offsets.into_iter().map(|offset| (offset, false)).collect();
        self.coverage.write().insert(contract, map);
    }

    /// Record that `offset` executed. Unknown contracts and offsets are ignored.
    pub fn mark(&self, contract: &ContractHash, offset: u32) {
        if let Some(hit) = self
            .coverage
            .write()
            .get_mut(contract)
            .and_then(|map| map.get_mut(&offset))
        {
            *hit = true;
        }
    }

    pub fn get(&self, contract: &ContractHash) -> Option<BTreeMap<u32, bool>> {
        self.coverage.read().get(contract).cloned()
    }

    /// Reset every flag to unhit and return the cleared map.
    pub fn clear(&self, contract: &ContractHash) -> Option<BTreeMap<u32, bool>> {
        let mut coverage = self.coverage.write();
        let map = coverage.get_mut(contract)?;
        map.values_mut().for_each(|hit| *hit = false);
        Some(map.clone())
    }

    pub(crate) fn forget(&self, contract: &ContractHash) {
        self.coverage.write().remove(contract);
    }
}
