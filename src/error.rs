use thiserror::Error;

use crate::types::ContractHash;

/// Errors surfaced synchronously to callers of the debugger.
///
/// VM faults are not represented here: a fault during execution is data and is
/// reported inside a [`crate::DebugReport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebuggerError {
    /// No debug profile has been ingested for this contract.
    #[error("{}", not_registered_message(.contract, .name.as_deref()))]
    NotRegisteredContract {
        contract: ContractHash,
        name: Option<String>,
    },

    /// A source breakpoint names a line that produced no code.
    #[error("no code is generated for {file} line {line}")]
    InvalidLocation { file: String, line: u32 },

    /// An assembly breakpoint names an offset that is not an instruction boundary.
    #[error("offset {offset} is not an instruction of contract {contract}")]
    InvalidOffset { contract: ContractHash, offset: u32 },

    /// The instruction dump contains a mnemonic the VM does not define.
    #[error("unknown opcode '{mnemonic}' at dump line {line}")]
    UnknownOpCode { line: usize, mnemonic: String },

    /// The metadata document could not be understood.
    #[error("invalid debug info: {0}")]
    InvalidDebugInfo(String),

    /// The suspended engine already halted; a new debug invocation is required.
    #[error("execution already halted; start a new debug invocation")]
    EngineHalted,

    /// The suspended engine faulted; a new debug invocation is required.
    #[error("execution already faulted; start a new debug invocation")]
    EngineFaulted,

    #[error("session '{0}' does not exist")]
    SessionNotFound(String),

    #[error("session '{0}' already exists")]
    SessionExists(String),

    #[error("no debug invocation is in progress for session '{0}'")]
    NoDebugInProgress(String),

    #[error("frame index {index} out of range (invocation stack depth {depth})")]
    FrameOutOfRange { index: usize, depth: usize },

    #[error("variable '{0}' not found")]
    VariableNotFound(String),

    #[error("contract {0} is not deployed")]
    ContractNotFound(ContractHash),

    #[error("method '{method}' with {parameter_count} parameter(s) not found in contract {contract}")]
    MethodNotFound {
        contract: ContractHash,
        method: String,
        parameter_count: usize,
    },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

fn not_registered_message(contract: &ContractHash, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("no debug info registered for contract {contract} ({name})"),
        None => format!("no debug info registered for contract {contract}"),
    }
}

impl DebuggerError {
    /// Contract of a not-registered error that has no name yet.
    pub fn unnamed_contract(&self) -> Option<&ContractHash> {
        match self {
            DebuggerError::NotRegisteredContract {
                contract,
                name: None,
            } => Some(contract),
            _ => None,
        }
    }

    /// Fill in the human readable contract name of a not-registered error.
    #[must_use]
    pub fn with_contract_name(self, resolved: Option<String>) -> Self {
        match self {
            DebuggerError::NotRegisteredContract { contract, name: None } => {
                DebuggerError::NotRegisteredContract {
                    contract,
                    name: resolved,
                }
            }
            other => other,
        }
    }
}
