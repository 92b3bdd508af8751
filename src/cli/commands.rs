use colored::Colorize;
use itertools::Itertools;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cli::{ArtifactArgs, CheckBreakpointsArgs, InspectArgs, OutputFormat, Verbosity};
use crate::debugger::{ContractDebugProfile, DebugRegistry};
use crate::runtime::loader::{load_artifacts, sibling_dump_path};
use crate::types::ContractHash;
use crate::{DebuggerError, Result};

/// Identity given to artifacts inspected outside of a chain.
fn offline_contract() -> ContractHash {
    ContractHash::default()
}

fn dump_path(args: &ArtifactArgs) -> Result<PathBuf> {
    match &args.dump {
        Some(path) => Ok(path.clone()),
        None => sibling_dump_path(&args.debug_info).ok_or_else(|| {
            DebuggerError::InvalidArguments(format!(
                "cannot derive a dump path from {}; pass --dump",
                args.debug_info.display()
            ))
            .into()
        }),
    }
}

fn load_registry(args: &ArtifactArgs) -> Result<(DebugRegistry, Arc<ContractDebugProfile>)> {
    let dump = dump_path(args)?;
    let artifacts = load_artifacts(&args.debug_info, &dump)?;
    let registry = DebugRegistry::new();
    registry.set_debug_info(offline_contract(), &artifacts.metadata, &artifacts.dump)?;
    let profile = registry.require_profile(&offline_contract())?;
    Ok((registry, profile))
}

/// Execute the inspect command.
pub fn inspect(args: InspectArgs, verbosity: Verbosity) -> Result<()> {
    let (_, profile) = load_registry(&args.artifacts)?;
    let info = &profile.debug_info;
    let map = &profile.source_map;

    if args.output == OutputFormat::Json {
        let methods = info
            .methods
            .iter()
            .map(|m| {
                json!({
                    "name": m.name,
                    "range": format!("{}-{}", m.range.start(), m.range.end()),
                    "parameters": m.parameters.iter().map(|p| &p.name).collect::<Vec<_>>(),
                    "variables": m.variables.iter().map(|v| &v.name).collect::<Vec<_>>(),
                    "returnType": m.return_type,
                })
            })
            .collect::<Vec<_>>();
        let line_starts = map
            .line_starts
            .iter()
            .map(|(offset, line)| {
                json!({
                    "offset": offset,
                    "file": line.location.file,
                    "line": line.location.line,
                    "text": line.text,
                })
            })
            .collect::<Vec<_>>();
        let output = json!({
            "methods": methods,
            "staticVariables": info.static_variables.iter().map(|s| &s.name).collect::<Vec<_>>(),
            "filenames": map.filenames,
            "instructionCount": map.opcodes.len(),
            "lineStarts": line_starts,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Methods".bold().cyan());
    for method in &info.methods {
        let params = method.parameters.iter().map(|p| &p.name).join(", ");
        println!(
            "  {}({params})  {}",
            method.name.bold(),
            format!("[{}..={}]", method.range.start(), method.range.end()).dimmed()
        );
    }
    if !info.static_variables.is_empty() {
        println!(
            "{} {}",
            "Statics:".bold().cyan(),
            info.static_variables.iter().map(|s| &s.name).join(", ")
        );
    }
    println!(
        "{} {}",
        "Files:".bold().cyan(),
        map.filenames.iter().join(", ")
    );
    println!(
        "{} {} instructions, {} line starts",
        "Code:".bold().cyan(),
        map.opcodes.len(),
        map.line_starts.len()
    );
    if verbosity != Verbosity::Quiet {
        for (offset, line) in &map.line_starts {
            println!(
                "  {:>6}  {}  {}",
                offset,
                line.location.to_string().yellow(),
                line.text.as_deref().unwrap_or_default().trim()
            );
        }
    }
    Ok(())
}

/// Execute the check-breakpoints command. Fails on the first unresolvable location.
pub fn check_breakpoints(args: CheckBreakpointsArgs, _verbosity: Verbosity) -> Result<()> {
    let (registry, profile) = load_registry(&args.artifacts)?;

    for location in &args.locations {
        let offsets = profile
            .source_map
            .line_starts
            .iter()
            .filter(|(_, line)| line.location == *location)
            .map(|(offset, _)| offset)
            .join(", ");
        if offsets.is_empty() {
            println!("{} {location}  no code generated", "✗".red().bold());
        } else {
            println!("{} {location}  offset {offsets}", "✓".green().bold());
        }
    }

    registry.set_source_breakpoints(&offline_contract(), &args.locations)?;
    info!(count = args.locations.len(), "all breakpoints resolve");
    Ok(())
}
