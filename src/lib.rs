//! Execution-control debugger for NeoVM smart contracts.
//!
//! The crate drives an externally supplied virtual machine one instruction at a
//! time against isolated, branchable ledger sessions. It provides:
//! - [`debug_info`] — source-map construction from compiler debug artifacts.
//! - [`debugger`]   — breakpoint registry, coverage tracking and the stepper.
//! - [`session`]    — named sessions with copy-on-write ledger snapshots.
//! - [`runtime`]    — the public façade, invocation and report formatting.

pub mod cli;
pub mod config;
pub mod debug_info;
pub mod debugger;
pub mod error;
pub mod ledger;
pub mod runtime;
pub mod session;
pub mod types;
pub mod vm;

pub use config::DebuggerConfig;
pub use error::DebuggerError;
pub use runtime::{ContractExecutor, DebugReport};
pub use types::{ContractHash, SourceLine, SourceLocation};

/// Result type used throughout the crate.
pub type Result<T> = anyhow::Result<T>;
