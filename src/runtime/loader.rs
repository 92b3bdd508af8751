//! Loading compiler debug artifacts from disk.
//!
//! The metadata document is usually named `<contract>.debug.json` and the
//! instruction dump `<contract>.nef.txt`. Both are read as UTF-8 text and parsed
//! together so that a broken pair never registers half a profile.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::debugger::ContractDebugProfile;
use crate::types::ContractHash;
use crate::{DebuggerError, Result};

/// Raw text of a metadata document and its instruction dump.
#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    pub metadata: String,
    pub dump: String,
}

impl DebugArtifacts {
    /// Parse the pair into a profile for `contract`.
    pub fn into_profile(self, contract: ContractHash) -> Result<ContractDebugProfile> {
        ContractDebugProfile::ingest(contract, &self.metadata, &self.dump)
    }
}

#[tracing::instrument(skip_all, fields(debug_info = %debug_info.display(), dump = %dump.display()))]
pub fn load_artifacts(debug_info: &Path, dump: &Path) -> Result<DebugArtifacts> {
    let metadata = read_text(debug_info)?;
    let dump_text = read_text(dump)?;
    info!(
        metadata_bytes = metadata.len(),
        dump_bytes = dump_text.len(),
        "loaded debug artifacts"
    );
    Ok(DebugArtifacts {
        metadata,
        dump: dump_text,
    })
}

/// The dump path conventionally paired with a metadata document:
/// `foo.debug.json` → `foo.nef.txt`.
pub fn sibling_dump_path(debug_info: &Path) -> Option<PathBuf> {
    let name = debug_info.file_name()?.to_str()?;
    let stem = name
        .strip_suffix(".debug.json")
        .or_else(|| name.strip_suffix(".json"))?;
    Some(debug_info.with_file_name(format!("{stem}.nef.txt")))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        DebuggerError::InvalidDebugInfo(format!("failed to read {}: {e}", path.display())).into()
    })
}
