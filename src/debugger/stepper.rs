//! The single-step driver.
//!
//! [`Stepper::advance_one`] executes one logical step of the engine and decides
//! whether execution should suspend. The stepping modes loop over it until the
//! engine leaves the running state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use tracing::trace;

use super::DebugRegistry;
use crate::vm::{ExecutionEngine, OpCode, VmState};
use crate::{DebuggerError, Result};

/// Why a running engine was suspended.
///
/// A bit set so callers can request several reasons at once, but a single stop
/// only ever reports one of them.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakReason(u8);

impl BreakReason {
    pub const NONE: Self = Self(0);
    pub const ASSEMBLY_BREAKPOINT: Self = Self(1 << 0);
    pub const SOURCE_CODE_BREAKPOINT: Self = Self(1 << 1);
    pub const CALL: Self = Self(1 << 2);
    pub const RETURN: Self = Self(1 << 3);
    pub const SOURCE_CODE: Self = Self(1 << 4);

    /// Either kind of explicit breakpoint.
    pub const BREAKPOINT: Self = Self(Self::ASSEMBLY_BREAKPOINT.0 | Self::SOURCE_CODE_BREAKPOINT.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BreakReason {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(BreakReason, &str); 5] = [
            (BreakReason::ASSEMBLY_BREAKPOINT, "AssemblyBreakpoint"),
            (BreakReason::SOURCE_CODE_BREAKPOINT, "SourceCodeBreakpoint"),
            (BreakReason::CALL, "Call"),
            (BreakReason::RETURN, "Return"),
            (BreakReason::SOURCE_CODE, "SourceCode"),
        ];
        if self.is_none() {
            return f.write_str("None");
        }
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(reason, _)| self.contains(*reason))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(" | "))
    }
}

/// Client-facing stepping commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepMode {
    Continue,
    StepInto,
    StepOut,
    /// Next source line in the same frame.
    StepOverSource,
    /// Exactly one instruction.
    StepOverAssembly,
}

impl StepMode {
    /// Reasons that suspend execution in this mode.
    pub fn required(self) -> BreakReason {
        match self {
            StepMode::Continue | StepMode::StepOverAssembly => BreakReason::BREAKPOINT,
            StepMode::StepInto => BreakReason::BREAKPOINT | BreakReason::CALL,
            StepMode::StepOut => BreakReason::BREAKPOINT | BreakReason::RETURN,
            StepMode::StepOverSource => BreakReason::BREAKPOINT | BreakReason::SOURCE_CODE,
        }
    }
}

/// Order in which stop conditions are evaluated after an ordinary instruction.
const STOP_CHECKS: [BreakReason; 3] = [
    BreakReason::ASSEMBLY_BREAKPOINT,
    BreakReason::SOURCE_CODE_BREAKPOINT,
    BreakReason::SOURCE_CODE,
];

/// Drives an engine using the breakpoints, source maps and coverage of a registry.
#[derive(Debug, Clone, Copy)]
pub struct Stepper<'a> {
    registry: &'a DebugRegistry,
}

impl<'a> Stepper<'a> {
    pub fn new(registry: &'a DebugRegistry) -> Self {
        Self { registry }
    }

    /// Advance by one logical step.
    ///
    /// Sets the engine to [`VmState::Break`] and returns the reason when one of
    /// the `required` conditions is met. Returns [`BreakReason::NONE`] with the
    /// engine still running otherwise, or when the engine reached a terminal state.
    pub fn advance_one<E: ExecutionEngine + ?Sized>(
        &self,
        engine: &mut E,
        required: BreakReason,
    ) -> BreakReason {
        if engine.state().is_terminal() {
            return BreakReason::NONE;
        }
        let instruction = engine
            .current_context()
            .and_then(|context| context.current_instruction());
        let Some(instruction) = instruction else {
            // Past the end of a script; let the engine unwind it.
            self.execute_covered(engine);
            return BreakReason::NONE;
        };

        if required.contains(BreakReason::CALL) && instruction.is_call() {
            return self.enter_call(engine);
        }

        if required.contains(BreakReason::RETURN) && instruction.opcode == OpCode::RET {
            self.execute_covered(engine);
            if engine.state().is_terminal() {
                return BreakReason::NONE;
            }
            engine.set_state(VmState::Break);
            return BreakReason::RETURN;
        }

        self.execute_covered(engine);
        if engine.state().is_terminal() {
            return BreakReason::NONE;
        }
        self.check_stop(engine, required)
    }

    /// Step into a callee and past its slot-initialisation prologue.
    ///
    /// A callee without a prologue is stepped over transparently: the engine keeps
    /// running and no reason is reported.
    fn enter_call<E: ExecutionEngine + ?Sized>(&self, engine: &mut E) -> BreakReason {
        self.execute_covered(engine);
        if engine.state().is_terminal() {
            return BreakReason::NONE;
        }
        let has_prologue = engine
            .current_context()
            .and_then(|context| context.current_instruction())
            .is_some_and(|instruction| instruction.opcode == OpCode::INITSLOT);
        if !has_prologue {
            return BreakReason::NONE;
        }
        self.execute_covered(engine);
        if engine.state().is_terminal() {
            return BreakReason::NONE;
        }
        engine.set_state(VmState::Break);
        BreakReason::CALL
    }

    /// Execute one instruction and mark it covered.
    ///
    /// Coverage is keyed by the contract that owns the executed instruction,
    /// captured before the step, so calls and returns that switch frames are
    /// attributed correctly.
    fn execute_covered<E: ExecutionEngine + ?Sized>(&self, engine: &mut E) {
        let position = engine
            .current_context()
            .map(|context| (context.script_hash(), context.instruction_pointer()));
        engine.execute_next();
        if let Some((contract, offset)) = position {
            self.registry.coverage.mark(&contract, offset);
        }
    }

    fn check_stop<E: ExecutionEngine + ?Sized>(
        &self,
        engine: &mut E,
        required: BreakReason,
    ) -> BreakReason {
        let Some(context) = engine.current_context() else {
            return BreakReason::NONE;
        };
        let contract = context.script_hash();
        let offset = context.instruction_pointer();
        let profile = self.registry.profile(&contract);
        let line = profile
            .as_ref()
            .and_then(|profile| profile.source_map.line_start(offset));

        for reason in STOP_CHECKS {
            if !required.contains(reason) {
                continue;
            }
            let hit = match reason {
                BreakReason::ASSEMBLY_BREAKPOINT => {
                    self.registry.breakpoints.has_assembly(&contract, offset)
                }
                BreakReason::SOURCE_CODE_BREAKPOINT => line.is_some_and(|line| {
                    self.registry
                        .breakpoints
                        .has_source(&contract, &line.location)
                }),
                BreakReason::SOURCE_CODE => line.is_some(),
                _ => false,
            };
            if hit {
                trace!(%contract, offset, ?reason, "stop condition met");
                engine.set_state(VmState::Break);
                return reason;
            }
        }
        BreakReason::NONE
    }

    /// Loop [`Self::advance_one`] until the engine leaves the running state.
    pub fn run<E: ExecutionEngine + ?Sized>(
        &self,
        engine: &mut E,
        required: BreakReason,
    ) -> BreakReason {
        loop {
            let reason = self.advance_one(engine, required);
            if engine.state() != VmState::None {
                return reason;
            }
        }
    }

    /// Resume a suspended engine in the given mode.
    ///
    /// Fails if the engine already halted or faulted.
    pub fn resume<E: ExecutionEngine + ?Sized>(
        &self,
        engine: &mut E,
        mode: StepMode,
    ) -> Result<BreakReason> {
        match engine.state() {
            VmState::Halt => return Err(DebuggerError::EngineHalted.into()),
            VmState::Fault => return Err(DebuggerError::EngineFaulted.into()),
            VmState::Break => engine.set_state(VmState::None),
            VmState::None => {}
        }
        let reason = match mode {
            StepMode::Continue | StepMode::StepInto | StepMode::StepOut => {
                self.run(engine, mode.required())
            }
            StepMode::StepOverSource => self.step_over_source(engine),
            StepMode::StepOverAssembly => {
                self.advance_one(engine, mode.required());
                if engine.state() == VmState::None {
                    engine.set_state(VmState::Break);
                }
                BreakReason::NONE
            }
        };
        Ok(reason)
    }

    /// Run to the next source line of the current frame.
    ///
    /// Line boundaries in deeper frames or other contracts are passed through;
    /// explicit breakpoints anywhere still stop execution.
    fn step_over_source<E: ExecutionEngine + ?Sized>(&self, engine: &mut E) -> BreakReason {
        let required = StepMode::StepOverSource.required();
        let depth = engine.invocation_depth();
        let contract = engine.current_context().map(|context| context.script_hash());
        loop {
            let reason = self.advance_one(engine, required);
            match engine.state() {
                VmState::None => continue,
                VmState::Break => {}
                VmState::Halt | VmState::Fault => return reason,
            }
            if reason.intersects(BreakReason::BREAKPOINT) {
                return reason;
            }
            let same_frame = engine.invocation_depth() == depth
                && engine.current_context().map(|context| context.script_hash()) == contract;
            if reason.contains(BreakReason::SOURCE_CODE) && same_frame {
                return reason;
            }
            engine.set_state(VmState::None);
        }
    }
}
