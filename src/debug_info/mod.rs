//! Compiler debug artifacts.
//!
//! Two artifacts describe a contract: a JSON metadata document listing methods
//! and their variables, and a textual instruction dump interleaving opcodes with
//! `# Code` source annotations. [`source_map`] turns the dump into lookup
//! tables; this module parses the metadata document.

pub mod dump;
pub mod source_map;

pub use dump::DumpLine;
pub use source_map::{LineContext, SourceMap};

use serde::Deserialize;
use std::ops::RangeInclusive;

use crate::{DebuggerError, Result};

/// A `name,type[,slot]` variable descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub name: String,
    pub type_name: String,
    pub slot: usize,
}

impl VariableDescriptor {
    /// Parse a descriptor; `position` is used when the slot index is omitted.
    pub fn parse(raw: &str, position: usize) -> Result<Self> {
        let mut parts = raw.split(',').map(str::trim);
        let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(|| {
            DebuggerError::InvalidDebugInfo(format!("empty variable descriptor '{raw}'"))
        })?;
        let type_name = parts.next().unwrap_or("Any");
        let slot = match parts.next() {
            Some(slot) => slot.parse::<usize>().map_err(|e| {
                DebuggerError::InvalidDebugInfo(format!("bad slot in descriptor '{raw}': {e}"))
            })?,
            None => position,
        };
        Ok(Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            slot,
        })
    }
}

/// A method of the contract with its instruction range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub id: String,
    pub name: String,
    /// Inclusive instruction range.
    pub range: RangeInclusive<u32>,
    pub parameters: Vec<VariableDescriptor>,
    pub variables: Vec<VariableDescriptor>,
    pub return_type: Option<String>,
}

impl MethodInfo {
    pub fn contains(&self, offset: u32) -> bool {
        self.range.contains(&offset)
    }
}

/// Parsed metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    pub documents: Vec<String>,
    pub methods: Vec<MethodInfo>,
    pub static_variables: Vec<VariableDescriptor>,
}

#[derive(Debug, Deserialize)]
struct RawDebugInfo {
    #[serde(default)]
    documents: Vec<String>,
    #[serde(default)]
    methods: Vec<RawMethod>,
    #[serde(default, rename = "static-variables")]
    static_variables: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawMethod {
    #[serde(default)]
    id: String,
    name: String,
    range: String,
    #[serde(default)]
    params: Vec<String>,
    #[serde(default)]
    variables: Vec<String>,
    #[serde(default, rename = "return")]
    return_type: Option<String>,
}

impl DebugInfo {
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawDebugInfo = serde_json::from_str(text)
            .map_err(|e| DebuggerError::InvalidDebugInfo(format!("malformed metadata: {e}")))?;

        let methods = raw
            .methods
            .into_iter()
            .map(|method| {
                Ok(MethodInfo {
                    range: parse_range(&method.range)?,
                    parameters: parse_descriptors(&method.params)?,
                    variables: parse_descriptors(&method.variables)?,
                    id: method.id,
                    name: method.name,
                    return_type: method.return_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            documents: raw.documents,
            methods,
            static_variables: parse_descriptors(&raw.static_variables)?,
        })
    }

    /// The method whose range contains `offset`.
    pub fn method_at(&self, offset: u32) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.contains(offset))
    }
}

fn parse_descriptors(raw: &[String]) -> Result<Vec<VariableDescriptor>> {
    raw.iter()
        .enumerate()
        .map(|(position, d)| VariableDescriptor::parse(d, position))
        .collect()
}

fn parse_range(raw: &str) -> Result<RangeInclusive<u32>> {
    let bad = || DebuggerError::InvalidDebugInfo(format!("bad method range '{raw}'"));
    let (start, end) = raw.split_once('-').ok_or_else(bad)?;
    let start = start.trim().parse::<u32>().map_err(|_| bad())?;
    let end = end.trim().parse::<u32>().map_err(|_| bad())?;
    if end < start {
        return Err(bad().into());
    }
    Ok(start..=end)
}
