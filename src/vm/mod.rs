//! Interface to the external virtual machine.
//!
//! The debugger never executes instructions itself. It drives an engine that
//! implements [`ExecutionEngine`] one instruction at a time and reads state back
//! through [`ExecutionContext`].
//!
//! Sub-modules:
//! - [`opcode`]     — NeoVM opcode table.
//! - [`stack_item`] — value model for inspection.
//! - [`script`]     — invocation script builder.

pub mod opcode;
pub mod script;
pub mod stack_item;

pub use opcode::{OpCode, Operand};
pub use script::{interop_hash, ContractParameter, ScriptBuilder, CONTRACT_CALL};
pub use stack_item::{StackItem, StackIterator};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::Snapshot;
use crate::session::RuntimeOverrides;
use crate::types::ContractHash;

/// State register of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VmState {
    /// Running, i.e. not suspended.
    #[default]
    None,
    Halt,
    Fault,
    Break,
}

impl VmState {
    pub fn is_terminal(self) -> bool {
        matches!(self, VmState::Halt | VmState::Fault)
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VmState::None => "NONE",
            VmState::Halt => "HALT",
            VmState::Fault => "FAULT",
            VmState::Break => "BREAK",
        };
        f.write_str(s)
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Vec<u8>,
}

impl Instruction {
    pub fn new(opcode: OpCode, operand: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            operand: operand.into(),
        }
    }

    /// Whether executing this instruction enters a callee frame.
    pub fn is_call(&self) -> bool {
        self.opcode.is_call()
            || (self.opcode == OpCode::SYSCALL && self.operand[..] == CONTRACT_CALL.to_le_bytes())
    }
}

/// A message emitted through the runtime log primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub contract: ContractHash,
    pub message: String,
}

/// An unrecoverable VM fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInfo {
    pub message: String,
    /// Stack trace as reported by the engine, if it keeps one.
    #[serde(default)]
    pub stack_trace: Option<String>,
}

/// Account and witness scope attached to an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub account: ContractHash,
    #[serde(default = "Signer::default_scopes")]
    pub scopes: String,
}

impl Signer {
    fn default_scopes() -> String {
        "CalledByEntry".to_string()
    }
}

/// One frame of an engine's invocation stack.
pub trait ExecutionContext {
    fn script_hash(&self) -> ContractHash;

    fn instruction_pointer(&self) -> u32;

    /// The instruction about to execute, `None` past the end of the script.
    fn current_instruction(&self) -> Option<Instruction>;

    fn script_len(&self) -> usize;

    fn arguments(&self) -> Option<&[StackItem]>;

    fn local_variables(&self) -> Option<&[StackItem]>;

    fn static_fields(&self) -> Option<&[StackItem]>;

    /// Evaluation stack, bottom first.
    fn evaluation_stack(&self) -> &[StackItem];
}

/// A virtual machine that can be stepped one instruction at a time.
pub trait ExecutionEngine: Send {
    fn state(&self) -> VmState;

    fn set_state(&mut self, state: VmState);

    /// Push a new entry script.
    fn load_script(&mut self, script: Vec<u8>);

    /// Execute exactly one instruction. Faults are recorded on the engine, not returned.
    fn execute_next(&mut self);

    /// Number of frames on the invocation stack.
    fn invocation_depth(&self) -> usize;

    /// Frame `index` counted from the top of the invocation stack.
    fn context(&self, index: usize) -> Option<&dyn ExecutionContext>;

    fn gas_consumed(&self) -> i64;

    fn fault(&self) -> Option<&FaultInfo>;

    /// Log messages in emission order.
    fn logs(&self) -> &[LogEntry];

    /// Items left by the entry script once the engine halts.
    fn result_stack(&self) -> &[StackItem];

    /// The ledger view this engine reads and writes.
    fn snapshot(&self) -> &Snapshot;

    fn current_context(&self) -> Option<&dyn ExecutionContext> {
        self.context(0)
    }

    /// Run until the engine leaves the running state.
    fn execute(&mut self) -> VmState {
        if self.state() == VmState::Break {
            self.set_state(VmState::None);
        }
        while self.state() == VmState::None {
            self.execute_next();
        }
        self.state()
    }
}

/// Builds engines bound to a ledger snapshot for a session.
pub trait EngineFactory: Send + Sync {
    type Engine: ExecutionEngine;

    fn create(
        &self,
        snapshot: Snapshot,
        overrides: &RuntimeOverrides,
        signers: &[Signer],
        gas_limit: i64,
    ) -> Self::Engine;
}
