//! Command-line interface of `neo-debug`.

pub mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::types::SourceLocation;

#[derive(Parser, Debug)]
#[command(name = "neo-debug")]
#[command(author, version, about = "Execution-control debugger for NeoVM smart contracts", long_about = None)]
pub struct Cli {
    /// Increase log output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to $NEO_DEBUGGER_CONFIG, then the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show methods, source files and line starts of a debug artifact pair
    Inspect(InspectArgs),

    /// Check that source breakpoints resolve to generated code
    CheckBreakpoints(CheckBreakpointsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// Debug metadata document (`*.debug.json`)
    #[arg(long = "debug-info", value_name = "FILE")]
    pub debug_info: PathBuf,

    /// Instruction dump (`*.nef.txt`); defaults to the file next to the metadata
    #[arg(long, value_name = "FILE")]
    pub dump: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct CheckBreakpointsArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Locations as `<file>:<line>`
    #[arg(required = true, value_name = "FILE:LINE")]
    pub locations: Vec<SourceLocation>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn to_log_level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "debug",
        }
    }
}
