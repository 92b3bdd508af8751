//! Read-only views over a suspended engine.
//!
//! Frames are addressed from the top of the invocation stack (`0` is the frame
//! currently executing). Variable names come from the method metadata whose
//! range contains the frame's instruction pointer.

use serde::Serialize;

use super::DebugRegistry;
use crate::debug_info::VariableDescriptor;
use crate::types::{ContractHash, SourceLine};
use crate::vm::{ExecutionContext, ExecutionEngine, OpCode, StackItem};
use crate::{DebuggerError, Result};

/// Which slot array a variable lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Argument,
    Local,
    Static,
}

/// A named slot value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub type_name: String,
    pub kind: VariableKind,
    pub value: StackItem,
}

/// One entry of the invocation stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    pub script_hash: ContractHash,
    pub instruction_pointer: u32,
    pub opcode: Option<OpCode>,
    pub script_len: usize,
    #[serde(flatten)]
    pub source: Option<SourceLine>,
}

/// Inspection helpers bound to one engine.
pub struct Inspector<'a, E: ?Sized> {
    registry: &'a DebugRegistry,
    engine: &'a E,
}

impl<'a, E: ExecutionEngine + ?Sized> Inspector<'a, E> {
    pub fn new(registry: &'a DebugRegistry, engine: &'a E) -> Self {
        Self { registry, engine }
    }

    fn frame(&self, index: usize) -> Result<&'a dyn ExecutionContext> {
        self.engine.context(index).ok_or_else(|| {
            DebuggerError::FrameOutOfRange {
                index,
                depth: self.engine.invocation_depth(),
            }
            .into()
        })
    }

    pub fn instruction_pointer(&self, index: usize) -> Result<u32> {
        Ok(self.frame(index)?.instruction_pointer())
    }

    /// Uninitialised slot arrays read as empty.
    pub fn arguments(&self, index: usize) -> Result<Vec<StackItem>> {
        Ok(self.frame(index)?.arguments().unwrap_or_default().to_vec())
    }

    pub fn locals(&self, index: usize) -> Result<Vec<StackItem>> {
        Ok(self
            .frame(index)?
            .local_variables()
            .unwrap_or_default()
            .to_vec())
    }

    pub fn statics(&self, index: usize) -> Result<Vec<StackItem>> {
        Ok(self.frame(index)?.static_fields().unwrap_or_default().to_vec())
    }

    /// Evaluation stack, top item first.
    pub fn evaluation_stack(&self, index: usize) -> Result<Vec<StackItem>> {
        Ok(self
            .frame(index)?
            .evaluation_stack()
            .iter()
            .rev()
            .cloned()
            .collect())
    }

    /// Descriptors visible in a frame, in lookup order.
    fn descriptors(
        &self,
        frame: &dyn ExecutionContext,
    ) -> Result<Vec<(VariableKind, VariableDescriptor)>> {
        let contract = frame.script_hash();
        let profile = self.registry.require_profile(&contract)?;
        let info = &profile.debug_info;
        let mut descriptors = Vec::new();
        if let Some(method) = info.method_at(frame.instruction_pointer()) {
            descriptors.extend(
                method
                    .parameters
                    .iter()
                    .map(|d| (VariableKind::Argument, d.clone())),
            );
            descriptors.extend(
                method
                    .variables
                    .iter()
                    .map(|d| (VariableKind::Local, d.clone())),
            );
        }
        descriptors.extend(
            info.static_variables
                .iter()
                .map(|d| (VariableKind::Static, d.clone())),
        );
        Ok(descriptors)
    }

    fn slot(frame: &dyn ExecutionContext, kind: VariableKind, slot: usize) -> Option<StackItem> {
        let slots = match kind {
            VariableKind::Argument => frame.arguments(),
            VariableKind::Local => frame.local_variables(),
            VariableKind::Static => frame.static_fields(),
        };
        slots.and_then(|slots| slots.get(slot)).cloned()
    }

    /// Resolve a variable by name: parameters, then locals, then statics.
    pub fn variable(&self, name: &str, index: usize) -> Result<Variable> {
        let frame = self.frame(index)?;
        self.descriptors(frame)?
            .into_iter()
            .filter(|(_, descriptor)| descriptor.name == name)
            .find_map(|(kind, descriptor)| {
                Self::slot(frame, kind, descriptor.slot).map(|value| Variable {
                    name: descriptor.name,
                    type_name: descriptor.type_name,
                    kind,
                    value,
                })
            })
            .ok_or_else(|| DebuggerError::VariableNotFound(name.to_string()).into())
    }

    /// Every named variable of a frame whose slot is initialised.
    pub fn variables(&self, index: usize) -> Result<Vec<Variable>> {
        let frame = self.frame(index)?;
        Ok(self
            .descriptors(frame)?
            .into_iter()
            .filter_map(|(kind, descriptor)| {
                Self::slot(frame, kind, descriptor.slot).map(|value| Variable {
                    name: descriptor.name,
                    type_name: descriptor.type_name,
                    kind,
                    value,
                })
            })
            .collect())
    }

    /// All frames, top first, with best-effort source locations.
    pub fn invocation_stack(&self) -> Vec<FrameInfo> {
        (0..self.engine.invocation_depth())
            .filter_map(|index| self.engine.context(index))
            .map(|frame| self.describe(frame))
            .collect()
    }

    pub(crate) fn describe(&self, frame: &dyn ExecutionContext) -> FrameInfo {
        let script_hash = frame.script_hash();
        let instruction_pointer = frame.instruction_pointer();
        let source = self
            .registry
            .profile(&script_hash)
            .and_then(|profile| profile.source_map.resolve(instruction_pointer).cloned());
        FrameInfo {
            script_hash,
            instruction_pointer,
            opcode: frame.current_instruction().map(|i| i.opcode),
            script_len: frame.script_len(),
            source,
        }
    }
}
