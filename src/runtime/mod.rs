//! Runtime execution sub-system for the NeoVM debugger.
//!
//! Sub-modules:
//! - [`executor`] — Public façade; coordinates all sub-modules.
//! - [`loader`]   — Reading debug artifacts from disk.
//! - [`invoker`]  — Invocation scripts and engine preparation.
//! - [`parser`]   — Argument and signer parsing.
//! - [`result`]   — Report types and formatting helpers.

pub mod executor;
pub mod invoker;
pub mod loader;
pub mod parser;
pub mod result;

pub use executor::{ContractExecutor, Invocation, InvocationRequest};
pub use loader::{load_artifacts, DebugArtifacts};
pub use result::{DebugReport, ReportLog, StackDump};
