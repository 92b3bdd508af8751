//! Identifiers and source locations shared by every per-contract table.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::DebuggerError;

/// 160-bit script hash identifying a deployed contract.
///
/// Stored little-endian as the VM sees it; displayed and parsed big-endian with
/// a `0x` prefix, which is how wallets and explorers print it.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractHash([u8; 20]);

impl ContractHash {
    pub const LEN: usize = 20;

    /// Raw little-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Build from little-endian bytes as pushed onto the VM stack.
    pub fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl From<[u8; 20]> for ContractHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ContractHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut be = self.0;
        be.reverse();
        write!(f, "0x{}", hex::encode(be))
    }
}

impl fmt::Debug for ContractHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractHash({self})")
    }
}

impl FromStr for ContractHash {
    type Err = DebuggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let mut bytes = hex::decode(digits)
            .map_err(|e| DebuggerError::InvalidArguments(format!("invalid hash '{s}': {e}")))?;
        if bytes.len() != Self::LEN {
            return Err(DebuggerError::InvalidArguments(format!(
                "invalid hash '{s}': expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        bytes.reverse();
        Self::from_le_slice(&bytes)
            .ok_or_else(|| DebuggerError::InvalidArguments(format!("invalid hash '{s}'")))
    }
}

impl Serialize for ContractHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContractHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A line of contract source, identified by file name and line number only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl FromStr for SourceLocation {
    type Err = DebuggerError;

    /// Parses `file:line`, splitting on the last colon so Windows paths survive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, line) = s.rsplit_once(':').ok_or_else(|| {
            DebuggerError::InvalidArguments(format!("expected <file>:<line>, got '{s}'"))
        })?;
        let line = line
            .trim()
            .parse::<u32>()
            .map_err(|e| DebuggerError::InvalidArguments(format!("invalid line in '{s}': {e}")))?;
        Ok(Self::new(file.trim(), line))
    }
}

/// A source location together with the text of that line, for display.
///
/// Equality, ordering and hashing only look at [`SourceLocation`]; the text is
/// never part of identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceLine {
    #[serde(flatten)]
    pub location: SourceLocation,
    #[serde(default)]
    pub text: Option<String>,
}

impl SourceLine {
    pub fn new(location: SourceLocation, text: Option<String>) -> Self {
        Self { location, text }
    }
}

impl PartialEq for SourceLine {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
    }
}

impl Eq for SourceLine {}

impl Hash for SourceLine {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location.hash(state);
    }
}

impl PartialOrd for SourceLine {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceLine {
    fn cmp(&self, other: &Self) -> Ordering {
        self.location.cmp(&other.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn contract_hash_displays_big_endian() {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x01;
        let hash = ContractHash::from(bytes);
        assert_eq!(
            hash.to_string(),
            "0x0000000000000000000000000000000000000001"
        );
        let parsed: ContractHash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn contract_hash_rejects_wrong_length() {
        assert!("0x1234".parse::<ContractHash>().is_err());
        assert!("zz".repeat(20).parse::<ContractHash>().is_err());
    }

    #[test]
    fn source_line_identity_ignores_text() {
        let a = SourceLine::new(SourceLocation::new("foo.cs", 10), Some("a = 1;".into()));
        let b = SourceLine::new(SourceLocation::new("foo.cs", 10), None);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn source_location_parses_last_colon() {
        let loc: SourceLocation = "C:\\src\\foo.cs:12".parse().unwrap();
        assert_eq!(loc.file, "C:\\src\\foo.cs");
        assert_eq!(loc.line, 12);
        assert!("foo.cs".parse::<SourceLocation>().is_err());
    }
}
