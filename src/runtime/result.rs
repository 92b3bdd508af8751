//! Report produced after every invocation and step.
//!
//! A VM fault is never an `Err` at this level: it shows up as `exception` plus a
//! multi-line `traceback` inside an otherwise normal report.

use itertools::Itertools;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt::Write as _;

use crate::debugger::inspect::Inspector;
use crate::debugger::{BreakReason, DebugRegistry};
use crate::ledger::Snapshot;
use crate::types::ContractHash;
use crate::vm::{ExecutionEngine, StackItem, VmState};

/// Serialised result stack, or the reason it could not be serialised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StackDump {
    Items(Vec<JsonValue>),
    Error { error: String },
}

impl StackDump {
    pub fn capture(items: &[StackItem], max_iterator_items: usize) -> Self {
        items
            .iter()
            .map(|item| item.to_json(max_iterator_items))
            .collect::<Result<Vec<_>, _>>()
            .map_or_else(|error| StackDump::Error { error }, StackDump::Items)
    }
}

/// A log message annotated with the emitting contract's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLog {
    pub contract: ContractHash,
    pub contract_name: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub state: VmState,
    pub break_reason: BreakReason,
    pub script_hash: Option<ContractHash>,
    pub contract_name: Option<String>,
    pub instruction_pointer: Option<u32>,
    pub source_filename: Option<String>,
    pub source_line_num: Option<u32>,
    pub source_content: Option<String>,
    pub gas_consumed: i64,
    pub exception: Option<String>,
    pub traceback: Option<String>,
    pub stack: StackDump,
    pub logs: Vec<ReportLog>,
}

impl DebugReport {
    /// Capture the state of `engine` after it stopped for `break_reason`.
    ///
    /// Contract names are looked up in `names`, normally the engine's own ledger view.
    pub fn capture<E: ExecutionEngine + ?Sized>(
        engine: &E,
        registry: &DebugRegistry,
        names: &Snapshot,
        break_reason: BreakReason,
        max_iterator_items: usize,
    ) -> Self {
        let contract_name = |hash: &ContractHash| names.contract(hash).map(|state| state.name);
        let context = engine.current_context();
        let script_hash = context.map(|c| c.script_hash());
        let instruction_pointer = context.map(|c| c.instruction_pointer());

        let source = script_hash
            .zip(instruction_pointer)
            .and_then(|(hash, ip)| {
                registry
                    .profile(&hash)
                    .and_then(|profile| profile.source_map.resolve(ip).cloned())
            });

        let stack_items: &[StackItem] = if engine.state() == VmState::Halt {
            engine.result_stack()
        } else {
            context.map(|c| c.evaluation_stack()).unwrap_or_default()
        };

        let logs = engine
            .logs()
            .iter()
            .map(|log| ReportLog {
                contract: log.contract,
                contract_name: contract_name(&log.contract),
                message: log.message.clone(),
            })
            .collect::<Vec<_>>();

        let exception = engine.fault().map(|fault| fault.message.clone());
        let traceback = engine
            .fault()
            .map(|_| traceback(engine, registry, &contract_name, &logs));

        Self {
            state: engine.state(),
            break_reason,
            script_hash,
            contract_name: script_hash.as_ref().and_then(contract_name),
            instruction_pointer,
            source_filename: source.as_ref().map(|s| s.location.file.clone()),
            source_line_num: source.as_ref().map(|s| s.location.line),
            source_content: source.and_then(|s| s.text),
            gas_consumed: engine.gas_consumed(),
            exception,
            traceback,
            stack: StackDump::capture(stack_items, max_iterator_items),
            logs,
        }
    }
}

fn traceback<E: ExecutionEngine + ?Sized>(
    engine: &E,
    registry: &DebugRegistry,
    contract_name: &dyn Fn(&ContractHash) -> Option<String>,
    logs: &[ReportLog],
) -> String {
    let mut out = String::new();
    if let Some(fault) = engine.fault() {
        let _ = writeln!(out, "{}", fault.message);
        if let Some(trace) = &fault.stack_trace {
            let _ = writeln!(out, "{trace}");
        }
    }

    let frames = Inspector::new(registry, engine).invocation_stack();
    if !frames.is_empty() {
        let _ = writeln!(out, "CallStack:");
    }
    for frame in frames {
        let name = contract_name(&frame.script_hash)
            .map(|name| format!(" ({name})"))
            .unwrap_or_default();
        let opcode = frame
            .opcode
            .map(|op| op.mnemonic())
            .unwrap_or("<end of script>");
        let _ = write!(
            out,
            "  at {}{name} ip={} {opcode} [script length {}]",
            frame.script_hash, frame.instruction_pointer, frame.script_len
        );
        match frame.source {
            Some(line) => {
                let text = line.text.as_deref().unwrap_or_default().trim();
                let _ = writeln!(out, " {}:{} \"{text}\"", line.location.file, line.location.line);
            }
            None => out.push('\n'),
        }
    }

    if !logs.is_empty() {
        let _ = writeln!(out, "Logs:");
        let lines = logs.iter().map(|log| {
            let name = log.contract_name.as_deref().unwrap_or("unknown");
            format!("  [{} ({name})] {}", log.contract, log.message)
        });
        let _ = writeln!(out, "{}", lines.format("\n"));
    }
    out.trim_end().to_string()
}
