//! Per-contract debug state and the execution stepper.
//!
//! Sub-modules:
//! - [`breakpoint`] — assembly and source breakpoint sets.
//! - [`coverage`]   — per-instruction hit tracking.
//! - [`stepper`]    — continue / step-into / step-out / step-over.
//! - [`inspect`]    — variable lookup through method metadata.

pub mod breakpoint;
pub mod coverage;
pub mod inspect;
pub mod stepper;

pub use breakpoint::BreakpointRegistry;
pub use coverage::CoverageTracker;
pub use stepper::{BreakReason, StepMode, Stepper};

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::info;

use crate::debug_info::{DebugInfo, SourceMap};
use crate::types::{ContractHash, SourceLocation};
use crate::{DebuggerError, Result};

/// Everything ingested for one contract.
#[derive(Debug, Clone)]
pub struct ContractDebugProfile {
    pub contract: ContractHash,
    pub debug_info: DebugInfo,
    pub source_map: SourceMap,
}

impl ContractDebugProfile {
    /// Parse both artifacts. Nothing is registered unless both succeed.
    pub fn ingest(contract: ContractHash, metadata: &str, dump: &str) -> Result<Self> {
        let debug_info = DebugInfo::from_json(metadata)?;
        let source_map = SourceMap::build(dump)?;
        Ok(Self {
            contract,
            debug_info,
            source_map,
        })
    }
}

/// Global, contract-keyed debug tables shared by every session.
#[derive(Debug, Default)]
pub struct DebugRegistry {
    profiles: RwLock<HashMap<ContractHash, Arc<ContractDebugProfile>>>,
    pub breakpoints: BreakpointRegistry,
    pub coverage: CoverageTracker,
}

impl DebugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest debug artifacts for `contract`, replacing any previous profile.
    ///
    /// Coverage is re-seeded from the new instruction table. Breakpoints are kept.
    pub fn set_debug_info(&self, contract: ContractHash, metadata: &str, dump: &str) -> Result<()> {
        let profile = ContractDebugProfile::ingest(contract, metadata, dump)?;
        self.coverage
            .seed(contract, profile.source_map.opcodes.keys().copied());
        info!(
            %contract,
            instructions = profile.source_map.opcodes.len(),
            methods = profile.debug_info.methods.len(),
            files = profile.source_map.filenames.len(),
            "registered debug info"
        );
        self.profiles.write().insert(contract, Arc::new(profile));
        Ok(())
    }

    pub fn profile(&self, contract: &ContractHash) -> Option<Arc<ContractDebugProfile>> {
        self.profiles.read().get(contract).cloned()
    }

    pub(crate) fn require_profile(&self, contract: &ContractHash) -> Result<Arc<ContractDebugProfile>> {
        self.profile(contract).ok_or_else(|| {
            DebuggerError::NotRegisteredContract {
                contract: *contract,
                name: None,
            }
            .into()
        })
    }

    /// Contracts with a profile, sorted.
    pub fn list_debug_info(&self) -> Vec<ContractHash> {
        let mut contracts: Vec<_> = self.profiles.read().keys().copied().collect();
        contracts.sort();
        contracts
    }

    pub fn list_filenames(&self, contract: &ContractHash) -> Result<Vec<String>> {
        let profile = self.require_profile(contract)?;
        Ok(profile.source_map.filenames.iter().cloned().collect())
    }

    /// Drop profiles together with their breakpoints and coverage.
    ///
    /// Reports per contract whether a profile existed.
    pub fn delete_debug_info(&self, contracts: &[ContractHash]) -> BTreeMap<ContractHash, bool> {
        let mut profiles = self.profiles.write();
        contracts
            .iter()
            .map(|contract| {
                let existed = profiles.remove(contract).is_some();
                self.breakpoints.forget(contract);
                self.coverage.forget(contract);
                if existed {
                    info!(%contract, "deleted debug info");
                }
                (*contract, existed)
            })
            .collect()
    }

    // ── breakpoints ─────────────────────────────────────────────────────────

    /// Add assembly breakpoints, validated against the instruction table when a
    /// profile exists. Contracts without a profile accept any offset.
    pub fn set_assembly_breakpoints(
        &self,
        contract: &ContractHash,
        offsets: &[u32],
    ) -> Result<BTreeMap<u32, bool>> {
        if let Some(profile) = self.profile(contract) {
            if let Some(offset) = offsets
                .iter()
                .find(|offset| profile.source_map.opcode(**offset).is_none())
            {
                return Err(DebuggerError::InvalidOffset {
                    contract: *contract,
                    offset: *offset,
                }
                .into());
            }
        }
        Ok(self.breakpoints.add_assembly(contract, offsets))
    }

    pub fn list_assembly_breakpoints(&self, contract: &ContractHash) -> Vec<u32> {
        self.breakpoints.assembly(contract)
    }

    pub fn delete_assembly_breakpoints(
        &self,
        contract: &ContractHash,
        offsets: &[u32],
    ) -> BTreeMap<u32, bool> {
        self.breakpoints.remove_assembly(contract, offsets)
    }

    /// Add source breakpoints. Every location must have produced code.
    pub fn set_source_breakpoints(
        &self,
        contract: &ContractHash,
        locations: &[SourceLocation],
    ) -> Result<Vec<SourceLocation>> {
        let profile = self.require_profile(contract)?;
        if let Some(missing) = locations
            .iter()
            .find(|location| !profile.source_map.contains_location(location))
        {
            return Err(DebuggerError::InvalidLocation {
                file: missing.file.clone(),
                line: missing.line,
            }
            .into());
        }
        self.breakpoints.add_source(contract, locations);
        Ok(locations.to_vec())
    }

    pub fn list_source_breakpoints(&self, contract: &ContractHash) -> Result<Vec<SourceLocation>> {
        self.require_profile(contract)?;
        Ok(self.breakpoints.source(contract))
    }

    pub fn delete_source_breakpoints(
        &self,
        contract: &ContractHash,
        locations: &[SourceLocation],
    ) -> Result<Vec<(SourceLocation, bool)>> {
        self.require_profile(contract)?;
        Ok(self.breakpoints.remove_source(contract, locations))
    }

    // ── coverage ────────────────────────────────────────────────────────────

    pub fn coverage(&self, contract: &ContractHash) -> Result<BTreeMap<u32, bool>> {
        self.require_profile(contract)?;
        Ok(self.coverage.get(contract).unwrap_or_default())
    }

    pub fn clear_coverage(&self, contract: &ContractHash) -> Result<BTreeMap<u32, bool>> {
        self.require_profile(contract)?;
        Ok(self.coverage.clear(contract).unwrap_or_default())
    }

    /// Source locations of all line starts of a contract, for tooling.
    pub fn locations(&self, contract: &ContractHash) -> Result<BTreeSet<SourceLocation>> {
        Ok(self.require_profile(contract)?.source_map.locations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"{"methods":[{"id":"m","name":"Demo,main","range":"0-8"}]}"#;
    const DUMP: &str = "# Code foo.cs line 10: \"a();\"\n0000 PUSH1\n0001 DROP\n# Code foo.cs line 11: \"b();\"\n0002 RET\n";

    fn contract() -> ContractHash {
        ContractHash::from([7; 20])
    }

    fn registry() -> DebugRegistry {
        let registry = DebugRegistry::new();
        registry.set_debug_info(contract(), METADATA, DUMP).unwrap();
        registry
    }

    #[test]
    fn failed_ingestion_registers_nothing() {
        let registry = DebugRegistry::new();
        assert!(registry
            .set_debug_info(contract(), METADATA, "0000 NOTANOP\n")
            .is_err());
        assert!(registry.list_debug_info().is_empty());
        assert!(registry.coverage.get(&contract()).is_none());
    }

    #[test]
    fn assembly_offsets_are_validated_atomically() {
        let registry = registry();
        let err = registry
            .set_assembly_breakpoints(&contract(), &[0, 5])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DebuggerError>(),
            Some(DebuggerError::InvalidOffset { offset: 5, .. })
        ));
        assert!(registry.list_assembly_breakpoints(&contract()).is_empty());
    }

    #[test]
    fn assembly_breakpoints_without_profile_are_speculative() {
        let registry = DebugRegistry::new();
        let added = registry
            .set_assembly_breakpoints(&contract(), &[42])
            .unwrap();
        assert_eq!(added.get(&42), Some(&true));
        assert_eq!(registry.list_assembly_breakpoints(&contract()), vec![42]);
    }

    #[test]
    fn source_breakpoints_need_profile() {
        let registry = DebugRegistry::new();
        let err = registry
            .set_source_breakpoints(&contract(), &[SourceLocation::new("foo.cs", 10)])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DebuggerError>(),
            Some(DebuggerError::NotRegisteredContract { .. })
        ));
    }

    #[test]
    fn invalid_source_location_leaves_set_unchanged() {
        let registry = registry();
        registry
            .set_source_breakpoints(&contract(), &[SourceLocation::new("foo.cs", 10)])
            .unwrap();
        let err = registry
            .set_source_breakpoints(
                &contract(),
                &[
                    SourceLocation::new("foo.cs", 11),
                    SourceLocation::new("foo.cs", 99),
                ],
            )
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DebuggerError>(),
            Some(&DebuggerError::InvalidLocation {
                file: "foo.cs".to_string(),
                line: 99,
            })
        );
        assert_eq!(
            registry.list_source_breakpoints(&contract()).unwrap(),
            vec![SourceLocation::new("foo.cs", 10)]
        );
    }

    #[test]
    fn delete_debug_info_drops_everything() {
        let registry = registry();
        registry.set_assembly_breakpoints(&contract(), &[0]).unwrap();
        let removed = registry.delete_debug_info(&[contract(), ContractHash::default()]);
        assert_eq!(removed.get(&contract()), Some(&true));
        assert_eq!(removed.get(&ContractHash::default()), Some(&false));
        assert!(registry.list_assembly_breakpoints(&contract()).is_empty());
        assert!(registry.coverage(&contract()).is_err());
    }

    #[test]
    fn filenames_are_sorted() {
        let registry = registry();
        assert_eq!(registry.list_filenames(&contract()).unwrap(), vec!["foo.cs"]);
    }
}
