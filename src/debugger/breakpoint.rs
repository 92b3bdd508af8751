use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::types::{ContractHash, SourceLocation};

/// Breakpoints of one contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointSet {
    pub assembly: BTreeSet<u32>,
    pub source: BTreeSet<SourceLocation>,
}

impl BreakpointSet {
    pub fn is_empty(&self) -> bool {
        self.assembly.is_empty() && self.source.is_empty()
    }
}

/// Manages breakpoints of every contract.
///
/// Validation against source maps happens in [`super::DebugRegistry`]; this type
/// only stores the sets.
#[derive(Debug, Default)]
pub struct BreakpointRegistry {
    breakpoints: RwLock<HashMap<ContractHash, BreakpointSet>>,
}

impl BreakpointRegistry {
    /// Create a new breakpoint registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add assembly breakpoints, reporting per offset whether it was new.
    pub fn add_assembly(&self, contract: &ContractHash, offsets: &[u32]) -> BTreeMap<u32, bool> {
        let mut breakpoints = self.breakpoints.write();
        let set = breakpoints.entry(*contract).or_default();
        let mut added = BTreeMap::new();
        for offset in offsets {
            // A repeated offset keeps the result of its first occurrence.
            if !added.contains_key(offset) {
                added.insert(*offset, set.assembly.insert(*offset));
            }
        }
        debug!(%contract, ?offsets, "set assembly breakpoints");
        added
    }

    /// Assembly breakpoints in ascending order.
    pub fn assembly(&self, contract: &ContractHash) -> Vec<u32> {
        self.breakpoints
            .read()
            .get(contract)
            .map(|set| set.assembly.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove assembly breakpoints.
    ///
    /// With no offsets every breakpoint is removed and reported; otherwise each
    /// offset reports whether it was present.
    pub fn remove_assembly(&self, contract: &ContractHash, offsets: &[u32]) -> BTreeMap<u32, bool> {
        let mut breakpoints = self.breakpoints.write();
        let Some(set) = breakpoints.get_mut(contract) else {
            return offsets.iter().map(|offset| (*offset, false)).collect();
        };
        let removed = if offsets.is_empty() {
            std::mem::take(&mut set.assembly)
                .into_iter()
                .map(|offset| (offset, true))
                .collect()
        } else {
            let mut removed = BTreeMap::new();
            for offset in offsets {
                if !removed.contains_key(offset) {
                    removed.insert(*offset, set.assembly.remove(offset));
                }
            }
            removed
        };
        debug!(%contract, ?offsets, "deleted assembly breakpoints");
        removed
    }

    pub fn add_source(&self, contract: &ContractHash, locations: &[SourceLocation]) {
        let mut breakpoints = self.breakpoints.write();
        let set = breakpoints.entry(*contract).or_default();
        set.source.extend(locations.iter().cloned());
        debug!(%contract, count = locations.len(), "set source breakpoints");
    }

    /// Source breakpoints ordered by (file, line).
    pub fn source(&self, contract: &ContractHash) -> Vec<SourceLocation> {
        self.breakpoints
            .read()
            .get(contract)
            .map(|set| set.source.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove source breakpoints, same shape as [`Self::remove_assembly`].
    pub fn remove_source(
        &self,
        contract: &ContractHash,
        locations: &[SourceLocation],
    ) -> Vec<(SourceLocation, bool)> {
        let mut breakpoints = self.breakpoints.write();
        let Some(set) = breakpoints.get_mut(contract) else {
            return locations.iter().map(|l| (l.clone(), false)).collect();
        };
        if locations.is_empty() {
            return std::mem::take(&mut set.source)
                .into_iter()
                .map(|location| (location, true))
                .collect();
        }
        let mut removed = BTreeSet::new();
        locations
            .iter()
            .map(|location| {
                if set.source.remove(location) {
                    removed.insert(location.clone());
                }
                (location.clone(), removed.contains(location))
            })
            .collect()
    }

    pub fn has_assembly(&self, contract: &ContractHash, offset: u32) -> bool {
        self.breakpoints
            .read()
            .get(contract)
            .is_some_and(|set| set.assembly.contains(&offset))
    }

    pub fn has_source(&self, contract: &ContractHash, location: &SourceLocation) -> bool {
        self.breakpoints
            .read()
            .get(contract)
            .is_some_and(|set| set.source.contains(location))
    }

    /// Snapshot of one contract's breakpoints.
    pub fn get(&self, contract: &ContractHash) -> BreakpointSet {
        self.breakpoints
            .read()
            .get(contract)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn forget(&self, contract: &ContractHash) {
        self.breakpoints.write().remove(contract);
    }
}
