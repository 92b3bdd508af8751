//! Instruction ↔ source lookup tables built from an instruction dump.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::DumpLine;
use crate::types::{SourceLine, SourceLocation};
use crate::vm::OpCode;
use crate::{DebuggerError, Result};

/// What an instruction belongs to in the dense map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineContext {
    /// Outside any method, or after a method ended.
    Undefined,
    /// Inside a method before its first source annotation.
    Method(String),
    /// The most recent source line.
    Source(SourceLine),
}

impl LineContext {
    pub fn source(&self) -> Option<&SourceLine> {
        match self {
            LineContext::Source(line) => Some(line),
            _ => None,
        }
    }
}

/// Lookup tables for one contract.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    /// Every instruction of the dump.
    pub opcodes: BTreeMap<u32, OpCode>,
    /// Only the first instruction generated for each annotated source line.
    pub line_starts: BTreeMap<u32, SourceLine>,
    /// Every instruction, stamped with the most recent line context.
    pub dense: BTreeMap<u32, LineContext>,
    /// Every (file, line) that produced code.
    pub locations: BTreeSet<SourceLocation>,
    pub filenames: BTreeSet<String>,
}

impl SourceMap {
    /// Build the tables in two passes over the dump.
    ///
    /// Lines the patterns do not recognise are skipped. An unknown mnemonic fails
    /// the whole build.
    pub fn build(dump: &str) -> Result<Self> {
        let lines: Vec<(usize, DumpLine<'_>)> = dump
            .lines()
            .enumerate()
            .filter_map(|(index, line)| DumpLine::parse(line).map(|parsed| (index + 1, parsed)))
            .collect();

        let mut map = SourceMap::default();
        map.collect_line_starts(&lines)?;
        map.collect_dense(&lines);

        debug!(
            instructions = map.opcodes.len(),
            line_starts = map.line_starts.len(),
            files = map.filenames.len(),
            "built source map"
        );
        Ok(map)
    }

    fn collect_line_starts(&mut self, lines: &[(usize, DumpLine<'_>)]) -> Result<()> {
        let mut pending: Option<SourceLine> = None;
        for (number, line) in lines {
            match line {
                DumpLine::OpCode {
                    offset, mnemonic, ..
                } => {
                    let opcode = mnemonic.parse::<OpCode>().map_err(|mnemonic| {
                        DebuggerError::UnknownOpCode {
                            line: *number,
                            mnemonic,
                        }
                    })?;
                    self.opcodes.insert(*offset, opcode);
                    if let Some(source) = pending.take() {
                        self.filenames.insert(source.location.file.clone());
                        self.locations.insert(source.location.clone());
                        self.line_starts.insert(*offset, source);
                    }
                }
                DumpLine::Source { file, line, text } => {
                    pending = Some(SourceLine::new(
                        SourceLocation::new(*file, *line),
                        Some((*text).to_string()),
                    ));
                }
                DumpLine::MethodStart(_) | DumpLine::MethodEnd(_) => pending = None,
            }
        }
        Ok(())
    }

    fn collect_dense(&mut self, lines: &[(usize, DumpLine<'_>)]) {
        let mut current = LineContext::Undefined;
        for (_, line) in lines {
            match line {
                DumpLine::MethodStart(name) => current = LineContext::Method((*name).to_string()),
                DumpLine::MethodEnd(_) => current = LineContext::Undefined,
                DumpLine::Source { file, line, text } => {
                    current = LineContext::Source(SourceLine::new(
                        SourceLocation::new(*file, *line),
                        Some((*text).to_string()),
                    ));
                }
                DumpLine::OpCode { offset, .. } => {
                    self.dense.insert(*offset, current.clone());
                }
            }
        }
    }

    pub fn opcode(&self, offset: u32) -> Option<OpCode> {
        self.opcodes.get(&offset).copied()
    }

    /// Source line starting at `offset`, if `offset` is breakpoint-eligible.
    pub fn line_start(&self, offset: u32) -> Option<&SourceLine> {
        self.line_starts.get(&offset)
    }

    /// Best-effort source line for any instruction.
    pub fn line_at(&self, offset: u32) -> Option<&SourceLine> {
        self.dense.get(&offset).and_then(LineContext::source)
    }

    /// Line-start lookup, falling back to the dense map.
    pub fn resolve(&self, offset: u32) -> Option<&SourceLine> {
        self.line_start(offset).or_else(|| self.line_at(offset))
    }

    pub fn contains_location(&self, location: &SourceLocation) -> bool {
        self.locations.contains(location)
    }
}
