use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::config::DebuggerConfig;
use crate::debugger::inspect::{FrameInfo, Inspector, Variable};
use crate::debugger::{BreakReason, DebugRegistry, StepMode, Stepper};
use crate::ledger::Snapshot;
use crate::runtime::invoker::prepare_engine;
use crate::runtime::parser::{parse_args, parse_signers};
use crate::runtime::result::DebugReport;
use crate::session::{DebugSession, RuntimeOverrides, SessionManager};
use crate::types::{ContractHash, SourceLocation};
use crate::vm::{ContractParameter, EngineFactory, ExecutionEngine, Signer, StackItem, VmState};
use crate::{DebuggerError, Result};

/// One invocation request.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub session: &'a str,
    /// Commit the resulting state into the session on `HALT`.
    pub writeback: bool,
    pub contract: ContractHash,
    pub method: &'a str,
    pub args: &'a [ContractParameter],
    pub signers: &'a [Signer],
}

/// Owned invocation request with arguments and signers parsed from JSON.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub session: String,
    pub writeback: bool,
    pub contract: ContractHash,
    pub method: String,
    pub args: Vec<ContractParameter>,
    pub signers: Vec<Signer>,
}

impl InvocationRequest {
    pub fn from_json(
        session: &str,
        contract: ContractHash,
        method: &str,
        args_json: &str,
        signers_json: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            session: session.to_string(),
            writeback: false,
            contract,
            method: method.to_string(),
            args: parse_args(args_json)?,
            signers: parse_signers(signers_json)?,
        })
    }

    #[must_use]
    pub fn with_writeback(mut self, writeback: bool) -> Self {
        self.writeback = writeback;
        self
    }

    pub fn invocation(&self) -> Invocation<'_> {
        Invocation {
            session: &self.session,
            writeback: self.writeback,
            contract: self.contract,
            method: &self.method,
            args: &self.args,
            signers: &self.signers,
        }
    }
}

/// Public entry point: debug info, breakpoints, coverage, sessions, execution
/// control and inspection.
pub struct ContractExecutor<F: EngineFactory> {
    config: DebuggerConfig,
    registry: DebugRegistry,
    sessions: SessionManager<F>,
}

impl<F: EngineFactory> ContractExecutor<F> {
    /// Create an executor whose sessions fork from `chain`.
    pub fn new(factory: F, chain: Snapshot, config: DebuggerConfig) -> Self {
        info!(
            max_gas = config.max_gas,
            max_iterator_result_items = config.max_iterator_result_items,
            "Initializing contract executor"
        );
        let overrides = RuntimeOverrides {
            timestamp: config.default_timestamp,
        };
        Self {
            config,
            registry: DebugRegistry::new(),
            sessions: SessionManager::new(factory, chain, overrides),
        }
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    pub fn registry(&self) -> &DebugRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionManager<F> {
        &self.sessions
    }

    /// Attach the deployed contract name to not-registered errors.
    fn named<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|err| match err.downcast::<DebuggerError>() {
            Ok(err) => {
                let name = err
                    .unnamed_contract()
                    .and_then(|contract| self.sessions.chain().contract(contract))
                    .map(|c| c.name);
                err.with_contract_name(name).into()
            }
            Err(err) => err,
        })
    }

    // ── debug info ───────────────────────────────────────────────────────────

    pub fn set_debug_info(&self, contract: ContractHash, metadata: &str, dump: &str) -> Result<()> {
        self.registry.set_debug_info(contract, metadata, dump)
    }

    pub fn list_debug_info(&self) -> Vec<ContractHash> {
        self.registry.list_debug_info()
    }

    pub fn list_filenames(&self, contract: &ContractHash) -> Result<Vec<String>> {
        self.named(self.registry.list_filenames(contract))
    }

    pub fn delete_debug_info(&self, contracts: &[ContractHash]) -> BTreeMap<ContractHash, bool> {
        self.registry.delete_debug_info(contracts)
    }

    // ── breakpoints ──────────────────────────────────────────────────────────

    pub fn set_assembly_breakpoints(
        &self,
        contract: &ContractHash,
        offsets: &[u32],
    ) -> Result<BTreeMap<u32, bool>> {
        self.registry.set_assembly_breakpoints(contract, offsets)
    }

    pub fn list_assembly_breakpoints(&self, contract: &ContractHash) -> Vec<u32> {
        self.registry.list_assembly_breakpoints(contract)
    }

    pub fn delete_assembly_breakpoints(
        &self,
        contract: &ContractHash,
        offsets: &[u32],
    ) -> BTreeMap<u32, bool> {
        self.registry.delete_assembly_breakpoints(contract, offsets)
    }

    pub fn set_source_breakpoints(
        &self,
        contract: &ContractHash,
        locations: &[SourceLocation],
    ) -> Result<Vec<SourceLocation>> {
        self.named(self.registry.set_source_breakpoints(contract, locations))
    }

    pub fn list_source_breakpoints(&self, contract: &ContractHash) -> Result<Vec<SourceLocation>> {
        self.named(self.registry.list_source_breakpoints(contract))
    }

    pub fn delete_source_breakpoints(
        &self,
        contract: &ContractHash,
        locations: &[SourceLocation],
    ) -> Result<Vec<(SourceLocation, bool)>> {
        self.named(self.registry.delete_source_breakpoints(contract, locations))
    }

    pub fn source_locations(&self, contract: &ContractHash) -> Result<BTreeSet<SourceLocation>> {
        self.named(self.registry.locations(contract))
    }

    // ── coverage ─────────────────────────────────────────────────────────────

    pub fn get_coverage(&self, contract: &ContractHash) -> Result<BTreeMap<u32, bool>> {
        self.named(self.registry.coverage(contract))
    }

    pub fn clear_coverage(&self, contract: &ContractHash) -> Result<BTreeMap<u32, bool>> {
        self.named(self.registry.clear_coverage(contract))
    }

    // ── sessions ─────────────────────────────────────────────────────────────

    pub fn new_sessions_from_chain(&self, names: &[String]) -> Vec<String> {
        self.sessions.new_sessions_from_chain(names)
    }

    pub fn delete_sessions(&self, names: &[String]) -> BTreeMap<String, bool> {
        self.sessions.delete_sessions(names)
    }

    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.list_sessions()
    }

    pub fn rename_session(&self, from: &str, to: &str) -> Result<()> {
        self.sessions.rename_session(from, to)
    }

    pub fn copy_session(&self, from: &str, to: &str) -> Result<()> {
        self.sessions.copy_session(from, to)
    }

    pub fn set_session_timestamp(&self, name: &str, timestamp: Option<u64>) {
        self.sessions.set_session_timestamp(name, timestamp);
    }

    pub fn get_session_timestamp(&self, names: &[String]) -> BTreeMap<String, Option<u64>> {
        self.sessions.get_session_timestamp(names)
    }

    // ── execution ────────────────────────────────────────────────────────────

    fn report(&self, engine: &F::Engine, reason: BreakReason) -> DebugReport {
        DebugReport::capture(
            engine,
            &self.registry,
            engine.snapshot(),
            reason,
            self.config.max_iterator_result_items,
        )
    }

    /// Run an invocation to completion without stopping at breakpoints.
    #[tracing::instrument(skip_all, fields(session = request.session, method = request.method))]
    pub fn invoke(&self, request: &Invocation<'_>) -> Result<DebugReport> {
        let handle = self.sessions.session(request.session);
        let mut session = handle.lock();
        let mut engine = prepare_engine(
            self.sessions.factory(),
            &session,
            &request.contract,
            request.method,
            request.args,
            request.signers,
            self.config.max_gas,
        )?;

        let state = engine.execute();
        if state == VmState::Halt && request.writeback {
            let snapshot = engine.snapshot().clone();
            session.write_back(&snapshot);
        }
        if let Some(fault) = engine.fault() {
            warn!(message = %fault.message, "invocation faulted");
        }
        info!(%state, gas = engine.gas_consumed(), "invocation finished");
        Ok(self.report(&engine, BreakReason::NONE))
    }

    /// Start a debug invocation and run it to the first breakpoint.
    ///
    /// Supersedes any debug invocation already suspended in the session.
    #[tracing::instrument(skip_all, fields(session = request.session, method = request.method))]
    pub fn start_debug(&self, request: &Invocation<'_>) -> Result<DebugReport> {
        let handle = self.sessions.session(request.session);
        let mut session = handle.lock();
        let engine = prepare_engine(
            self.sessions.factory(),
            &session,
            &request.contract,
            request.method,
            request.args,
            request.signers,
            self.config.max_gas,
        )?;
        session.begin_debug(engine, request.writeback);
        info!(contract = %request.contract, "debug invocation started");
        self.drive(&mut session, StepMode::Continue)
    }

    fn drive(&self, session: &mut DebugSession<F::Engine>, mode: StepMode) -> Result<DebugReport> {
        let suspended = session.suspended_mut()?;
        let reason = Stepper::new(&self.registry).resume(&mut suspended.engine, mode)?;
        session.settle();

        let engine = &session.suspended()?.engine;
        let report = self.report(engine, reason);
        info!(
            session = session.name(),
            ?mode,
            state = %report.state,
            reason = ?report.break_reason,
            contract = ?report.script_hash,
            ip = ?report.instruction_pointer,
            "execution stopped"
        );
        Ok(report)
    }

    fn step(&self, session: &str, mode: StepMode) -> Result<DebugReport> {
        let handle = self.sessions.existing(session)?;
        let mut session = handle.lock();
        self.drive(&mut session, mode)
    }

    pub fn continue_execution(&self, session: &str) -> Result<DebugReport> {
        self.step(session, StepMode::Continue)
    }

    pub fn step_into(&self, session: &str) -> Result<DebugReport> {
        self.step(session, StepMode::StepInto)
    }

    pub fn step_out(&self, session: &str) -> Result<DebugReport> {
        self.step(session, StepMode::StepOut)
    }

    pub fn step_over_source(&self, session: &str) -> Result<DebugReport> {
        self.step(session, StepMode::StepOverSource)
    }

    pub fn step_over_assembly(&self, session: &str) -> Result<DebugReport> {
        self.step(session, StepMode::StepOverAssembly)
    }

    // ── inspection ───────────────────────────────────────────────────────────

    fn inspect<T>(
        &self,
        session: &str,
        f: impl FnOnce(&Inspector<'_, F::Engine>) -> Result<T>,
    ) -> Result<T> {
        let handle = self.sessions.existing(session)?;
        let session = handle.lock();
        let engine = &session.suspended()?.engine;
        self.named(f(&Inspector::new(&self.registry, engine)))
    }

    pub fn get_locals(&self, session: &str, frame: usize) -> Result<Vec<StackItem>> {
        self.inspect(session, |i| i.locals(frame))
    }

    pub fn get_arguments(&self, session: &str, frame: usize) -> Result<Vec<StackItem>> {
        self.inspect(session, |i| i.arguments(frame))
    }

    pub fn get_statics(&self, session: &str, frame: usize) -> Result<Vec<StackItem>> {
        self.inspect(session, |i| i.statics(frame))
    }

    pub fn get_evaluation_stack(&self, session: &str, frame: usize) -> Result<Vec<StackItem>> {
        self.inspect(session, |i| i.evaluation_stack(frame))
    }

    pub fn get_instruction_pointer(&self, session: &str, frame: usize) -> Result<u32> {
        self.inspect(session, |i| i.instruction_pointer(frame))
    }

    pub fn get_variable_by_name(&self, session: &str, name: &str, frame: usize) -> Result<Variable> {
        self.inspect(session, |i| i.variable(name, frame))
    }

    pub fn get_variables(&self, session: &str, frame: usize) -> Result<Vec<Variable>> {
        self.inspect(session, |i| i.variables(frame))
    }

    pub fn get_invocation_stack(&self, session: &str) -> Result<Vec<FrameInfo>> {
        self.inspect(session, |i| Ok(i.invocation_stack()))
    }
}
