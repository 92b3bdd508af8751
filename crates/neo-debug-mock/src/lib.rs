//! A small deterministic NeoVM engine for tests and benches.
//!
//! [`MockEngine`] interprets the subset of the instruction set that hand
//! assembled test contracts use: constants, jumps, calls, slots, basic
//! arithmetic and the `Contract.Call`, `Runtime.Log`, `Runtime.GetTime` and
//! `Storage.Get/Put` system calls. Every instruction costs one unit of gas.
//! Anything else faults the engine.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use neo_debugger::ledger::{ContractMethod, ContractState, Snapshot, StorageKey};
use neo_debugger::session::RuntimeOverrides;
use neo_debugger::vm::{
    interop_hash, EngineFactory, ExecutionContext, ExecutionEngine, FaultInfo, Instruction,
    LogEntry, OpCode, Signer, StackItem, VmState,
};
use neo_debugger::ContractHash;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockFault {
    #[error("no execution context")]
    NoFrame,
    #[error("invalid instruction at {0}")]
    InvalidInstruction(u32),
    #[error("opcode {0} is not supported")]
    Unsupported(OpCode),
    #[error("evaluation stack underflow")]
    StackUnderflow,
    #[error("slot {0} is not initialised")]
    BadSlot(usize),
    #[error("type mismatch: expected {0}")]
    TypeMismatch(&'static str),
    #[error("arithmetic overflow")]
    Overflow,
    #[error("jump target {0} out of range")]
    BadJump(i64),
    #[error("ABORT is executed")]
    Abort,
    #[error("ASSERT is executed with false result")]
    AssertFailed,
    #[error("An unhandled exception was thrown. {0}")]
    Thrown(String),
    #[error("syscall {0:#010x} is not supported")]
    UnknownSyscall(u32),
    #[error("called contract {0} does not exist")]
    ContractNotFound(ContractHash),
    #[error("method {method}/{parameter_count} not found in {contract}")]
    MethodNotFound {
        contract: ContractHash,
        method: String,
        parameter_count: usize,
    },
    #[error("gas limit {0} exceeded")]
    OutOfGas(i64),
}

type Step = Result<(), MockFault>;

#[derive(Debug, Clone, Copy)]
struct Syscalls {
    contract_call: u32,
    log: u32,
    get_time: u32,
    storage_get: u32,
    storage_put: u32,
}

impl Syscalls {
    fn new() -> Self {
        Self {
            contract_call: interop_hash("System.Contract.Call"),
            log: interop_hash("System.Runtime.Log"),
            get_time: interop_hash("System.Runtime.GetTime"),
            storage_get: interop_hash("System.Storage.Get"),
            storage_put: interop_hash("System.Storage.Put"),
        }
    }
}

/// How a frame hands its evaluation stack back on `RET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    /// The entry script; its stack becomes the result stack.
    Script,
    /// Internal `CALL`; the stack was moved in from the caller and moves back.
    Internal,
    /// `System.Contract.Call`; items are pushed onto the caller's stack.
    Contract,
}

/// One frame of a [`MockEngine`].
#[derive(Debug, Clone)]
pub struct MockContext {
    script_hash: ContractHash,
    script: Arc<Vec<u8>>,
    ip: u32,
    entry: Entry,
    evaluation: Vec<StackItem>,
    locals: Option<Vec<StackItem>>,
    arguments: Option<Vec<StackItem>>,
    statics: Option<Vec<StackItem>>,
}

impl MockContext {
    fn new(script_hash: ContractHash, script: Arc<Vec<u8>>, ip: u32, entry: Entry) -> Self {
        Self {
            script_hash,
            script,
            ip,
            entry,
            evaluation: Vec::new(),
            locals: None,
            arguments: None,
            statics: None,
        }
    }

    fn decode(&self) -> Result<Option<(Instruction, u32)>, MockFault> {
        let ip = self.ip as usize;
        let Some(byte) = self.script.get(ip) else {
            return Ok(None);
        };
        let invalid = || MockFault::InvalidInstruction(self.ip);
        let opcode = OpCode::from_byte(*byte).ok_or_else(invalid)?;
        let len = opcode
            .encoded_len(&self.script[ip + 1..])
            .ok_or_else(invalid)?;
        let operand = self.script.get(ip + 1..ip + len).ok_or_else(invalid)?;
        Ok(Some((Instruction::new(opcode, operand), len as u32)))
    }
}

impl ExecutionContext for MockContext {
    fn script_hash(&self) -> ContractHash {
        self.script_hash
    }

    fn instruction_pointer(&self) -> u32 {
        self.ip
    }

    fn current_instruction(&self) -> Option<Instruction> {
        self.decode().ok().flatten().map(|(instruction, _)| instruction)
    }

    fn script_len(&self) -> usize {
        self.script.len()
    }

    fn arguments(&self) -> Option<&[StackItem]> {
        self.arguments.as_deref()
    }

    fn local_variables(&self) -> Option<&[StackItem]> {
        self.locals.as_deref()
    }

    fn static_fields(&self) -> Option<&[StackItem]> {
        self.statics.as_deref()
    }

    fn evaluation_stack(&self) -> &[StackItem] {
        &self.evaluation
    }
}

/// Script hash of an entry script. Not the real Hash160, which is irrelevant here.
pub fn script_hash(script: &[u8]) -> ContractHash {
    let digest = Sha256::digest(script);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    ContractHash::from(bytes)
}

pub struct MockEngine {
    state: VmState,
    contexts: Vec<MockContext>,
    result_stack: Vec<StackItem>,
    gas_consumed: i64,
    gas_limit: i64,
    fault: Option<FaultInfo>,
    logs: Vec<LogEntry>,
    snapshot: Snapshot,
    overrides: RuntimeOverrides,
    signers: Vec<Signer>,
    syscalls: Syscalls,
}

impl MockEngine {
    pub fn new(
        snapshot: Snapshot,
        overrides: RuntimeOverrides,
        signers: Vec<Signer>,
        gas_limit: i64,
    ) -> Self {
        Self {
            state: VmState::None,
            contexts: Vec::new(),
            result_stack: Vec::new(),
            gas_consumed: 0,
            gas_limit,
            fault: None,
            logs: Vec::new(),
            snapshot,
            overrides,
            signers,
            syscalls: Syscalls::new(),
        }
    }

    pub fn signers(&self) -> &[Signer] {
        &self.signers
    }

    fn top(&mut self) -> Result<&mut MockContext, MockFault> {
        self.contexts.last_mut().ok_or(MockFault::NoFrame)
    }

    fn pop(&mut self) -> Result<StackItem, MockFault> {
        self.top()?.evaluation.pop().ok_or(MockFault::StackUnderflow)
    }

    fn push(&mut self, item: StackItem) -> Step {
        self.top()?.evaluation.push(item);
        Ok(())
    }

    fn pop_integer(&mut self) -> Result<i128, MockFault> {
        self.pop()?
            .as_integer()
            .ok_or(MockFault::TypeMismatch("Integer"))
    }

    fn pop_bytes(&mut self) -> Result<Vec<u8>, MockFault> {
        let item = self.pop()?;
        item.as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or(MockFault::TypeMismatch("ByteString"))
    }

    fn jump(&mut self, start: u32, offset: i64) -> Step {
        let target = i64::from(start) + offset;
        let len = self.top()?.script.len() as i64;
        if !(0..=len).contains(&target) {
            return Err(MockFault::BadJump(target));
        }
        self.top()?.ip = target as u32;
        Ok(())
    }

    fn slot(
        &mut self,
        which: fn(&mut MockContext) -> &mut Option<Vec<StackItem>>,
        index: usize,
    ) -> Result<&mut StackItem, MockFault> {
        which(self.top()?)
            .as_mut()
            .and_then(|slots| slots.get_mut(index))
            .ok_or(MockFault::BadSlot(index))
    }

    fn load(
        &mut self,
        which: fn(&mut MockContext) -> &mut Option<Vec<StackItem>>,
        index: usize,
    ) -> Step {
        let item = self.slot(which, index)?.clone();
        self.push(item)?;
        Ok(())
    }

    fn store(
        &mut self,
        which: fn(&mut MockContext) -> &mut Option<Vec<StackItem>>,
        index: usize,
    ) -> Step {
        let item = self.pop()?;
        *self.slot(which, index)? = item;
        Ok(())
    }

    fn binary(&mut self, op: fn(i128, i128) -> Option<StackItem>) -> Step {
        let right = self.pop_integer()?;
        let left = self.pop_integer()?;
        let result = op(left, right).ok_or(MockFault::Overflow)?;
        self.push(result)?;
        Ok(())
    }

    fn ret(&mut self) -> Step {
        let Some(frame) = self.contexts.pop() else {
            return Ok(());
        };
        match frame.entry {
            Entry::Script if self.contexts.is_empty() => {
                self.result_stack = frame.evaluation;
                self.state = VmState::Halt;
            }
            Entry::Script | Entry::Contract => {
                if let Some(caller) = self.contexts.last_mut() {
                    caller.evaluation.extend(frame.evaluation);
                }
            }
            Entry::Internal => {
                if let Some(caller) = self.contexts.last_mut() {
                    caller.evaluation = frame.evaluation;
                    if caller.script_hash == frame.script_hash {
                        caller.statics = frame.statics;
                    }
                }
            }
        }
        Ok(())
    }

    fn call_internal(&mut self, target: u32) -> Step {
        let caller = self.top()?;
        let mut callee = MockContext::new(
            caller.script_hash,
            Arc::clone(&caller.script),
            target,
            Entry::Internal,
        );
        callee.evaluation = std::mem::take(&mut caller.evaluation);
        callee.statics = caller.statics.clone();
        self.contexts.push(callee);
        Ok(())
    }

    fn syscall(&mut self, hash: u32) -> Step {
        let calls = self.syscalls;
        if hash == calls.contract_call {
            self.contract_call()
        } else if hash == calls.log {
            let message = String::from_utf8_lossy(&self.pop_bytes()?).into_owned();
            let contract = self.top()?.script_hash;
            self.logs.push(LogEntry { contract, message });
            Ok(())
        } else if hash == calls.get_time {
            let time = self
                .overrides
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().max(0) as u64);
            self.push(StackItem::Integer(i128::from(time)))?;
            Ok(())
        } else if hash == calls.storage_get {
            let key = self.pop_bytes()?;
            let contract = self.top()?.script_hash;
            let value = self
                .snapshot
                .get(&StorageKey::new(contract, key))
                .map_or(StackItem::Any, StackItem::ByteString);
            self.push(value)?;
            Ok(())
        } else if hash == calls.storage_put {
            let key = self.pop_bytes()?;
            let value = match self.pop()? {
                StackItem::Integer(i) => integer_bytes(i),
                other => other
                    .as_bytes()
                    .map(<[u8]>::to_vec)
                    .ok_or(MockFault::TypeMismatch("ByteString"))?,
            };
            let contract = self.top()?.script_hash;
            self.snapshot.put(StorageKey::new(contract, key), value);
            Ok(())
        } else {
            Err(MockFault::UnknownSyscall(hash))
        }
    }

    fn contract_call(&mut self) -> Step {
        let hash = self.pop_bytes()?;
        let contract =
            ContractHash::from_le_slice(&hash).ok_or(MockFault::TypeMismatch("Hash160"))?;
        let method = String::from_utf8_lossy(&self.pop_bytes()?).into_owned();
        let _flags = self.pop_integer()?;
        let args = match self.pop()? {
            StackItem::Array(items) | StackItem::Struct(items) => items,
            _ => return Err(MockFault::TypeMismatch("Array")),
        };

        let state = self
            .snapshot
            .contract(&contract)
            .ok_or(MockFault::ContractNotFound(contract))?;
        let entry = state
            .method(&method, args.len())
            .ok_or_else(|| MockFault::MethodNotFound {
                contract,
                method: method.clone(),
                parameter_count: args.len(),
            })?;
        let mut callee =
            MockContext::new(contract, Arc::new(state.script.clone()), entry.offset, Entry::Contract);
        callee.evaluation = args.into_iter().rev().collect();
        trace!(%contract, method = %method, "contract call");
        self.contexts.push(callee);
        Ok(())
    }

    fn step(&mut self) -> Step {
        self.gas_consumed += 1;
        if self.gas_consumed > self.gas_limit {
            return Err(MockFault::OutOfGas(self.gas_limit));
        }

        let Some((instruction, len)) = self.top()?.decode()? else {
            return self.ret();
        };
        let start = self.top()?.ip;
        self.top()?.ip = start + len;
        let operand = instruction.operand.as_slice();

        use OpCode::*;
        match instruction.opcode {
            NOP => {}
            PUSHINT8 | PUSHINT16 | PUSHINT32 | PUSHINT64 | PUSHINT128 => {
                self.push(StackItem::Integer(signed_le(operand)))?;
            }
            PUSHT => self.push(StackItem::Boolean(true))?,
            PUSHF => self.push(StackItem::Boolean(false))?,
            PUSHNULL => self.push(StackItem::Any)?,
            PUSHDATA1 | PUSHDATA2 | PUSHDATA4 => {
                let prefix = match instruction.opcode {
                    PUSHDATA1 => 1,
                    PUSHDATA2 => 2,
                    _ => 4,
                };
                self.push(StackItem::ByteString(operand[prefix..].to_vec()))?;
            }
            PUSHM1 => self.push(StackItem::Integer(-1))?,
            op if (PUSH0 as u8..=PUSH16 as u8).contains(&(op as u8)) => {
                self.push(StackItem::Integer(i128::from(op as u8 - PUSH0 as u8)))?;
            }
            JMP | JMP_L => self.jump(start, signed_le(operand) as i64)?,
            JMPIF | JMPIF_L | JMPIFNOT | JMPIFNOT_L => {
                let condition = self.pop()?.to_bool();
                let expected = matches!(instruction.opcode, JMPIF | JMPIF_L);
                if condition == expected {
                    self.jump(start, signed_le(operand) as i64)?;
                }
            }
            CALL | CALL_L => {
                let target = i64::from(start) + signed_le(operand) as i64;
                let len = self.top()?.script.len() as i64;
                if !(0..len).contains(&target) {
                    return Err(MockFault::BadJump(target));
                }
                self.call_internal(target as u32)?;
            }
            RET => self.ret()?,
            ABORT => return Err(MockFault::Abort),
            ASSERT => {
                if !self.pop()?.to_bool() {
                    return Err(MockFault::AssertFailed);
                }
            }
            THROW => {
                let message = self
                    .pop()?
                    .as_bytes()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default();
                return Err(MockFault::Thrown(message));
            }
            SYSCALL => {
                let hash = u32::from_le_bytes(
                    operand
                        .try_into()
                        .map_err(|_| MockFault::InvalidInstruction(start))?,
                );
                self.syscall(hash)?;
            }
            DROP => {
                self.pop()?;
            }
            DUP => {
                let item = self.pop()?;
                self.push(item.clone())?;
                self.push(item)?;
            }
            SWAP => {
                let top = self.pop()?;
                let below = self.pop()?;
                self.push(top)?;
                self.push(below)?;
            }
            INITSSLOT => {
                self.top()?.statics = Some(vec![StackItem::Any; usize::from(operand[0])]);
            }
            INITSLOT => {
                let locals = usize::from(operand[0]);
                let count = usize::from(operand[1]);
                let mut arguments = Vec::with_capacity(count);
                for _ in 0..count {
                    arguments.push(self.pop()?);
                }
                let frame = self.top()?;
                frame.locals = Some(vec![StackItem::Any; locals]);
                frame.arguments = Some(arguments);
            }
            LDSFLD0 | LDSFLD1 | LDSFLD2 | LDSFLD3 | LDSFLD4 | LDSFLD5 | LDSFLD6 => {
                self.load(statics, usize::from(instruction.opcode as u8 - LDSFLD0 as u8))?
            }
            LDSFLD => self.load(statics, usize::from(operand[0]))?,
            STSFLD0 | STSFLD1 | STSFLD2 | STSFLD3 | STSFLD4 | STSFLD5 | STSFLD6 => {
                self.store(statics, usize::from(instruction.opcode as u8 - STSFLD0 as u8))?
            }
            STSFLD => self.store(statics, usize::from(operand[0]))?,
            LDLOC0 | LDLOC1 | LDLOC2 | LDLOC3 | LDLOC4 | LDLOC5 | LDLOC6 => {
                self.load(locals, usize::from(instruction.opcode as u8 - LDLOC0 as u8))?
            }
            LDLOC => self.load(locals, usize::from(operand[0]))?,
            STLOC0 | STLOC1 | STLOC2 | STLOC3 | STLOC4 | STLOC5 | STLOC6 => {
                self.store(locals, usize::from(instruction.opcode as u8 - STLOC0 as u8))?
            }
            STLOC => self.store(locals, usize::from(operand[0]))?,
            LDARG0 | LDARG1 | LDARG2 | LDARG3 | LDARG4 | LDARG5 | LDARG6 => {
                self.load(arguments, usize::from(instruction.opcode as u8 - LDARG0 as u8))?
            }
            LDARG => self.load(arguments, usize::from(operand[0]))?,
            STARG0 | STARG1 | STARG2 | STARG3 | STARG4 | STARG5 | STARG6 => {
                self.store(arguments, usize::from(instruction.opcode as u8 - STARG0 as u8))?
            }
            STARG => self.store(arguments, usize::from(operand[0]))?,
            ADD => self.binary(|a, b| a.checked_add(b).map(StackItem::Integer))?,
            SUB => self.binary(|a, b| a.checked_sub(b).map(StackItem::Integer))?,
            MUL => self.binary(|a, b| a.checked_mul(b).map(StackItem::Integer))?,
            NUMEQUAL => self.binary(|a, b| Some(StackItem::Boolean(a == b)))?,
            LT => self.binary(|a, b| Some(StackItem::Boolean(a < b)))?,
            GT => self.binary(|a, b| Some(StackItem::Boolean(a > b)))?,
            INC | DEC => {
                let value = self.pop_integer()?;
                let delta = if instruction.opcode == INC { 1 } else { -1 };
                let result = value.checked_add(delta).ok_or(MockFault::Overflow)?;
                self.push(StackItem::Integer(result))?;
            }
            NEWARRAY0 => self.push(StackItem::Array(Vec::new()))?,
            PACK => {
                let count = usize::try_from(self.pop_integer()?)
                    .map_err(|_| MockFault::TypeMismatch("non-negative count"))?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.pop()?);
                }
                self.push(StackItem::Array(items))?;
            }
            other => return Err(MockFault::Unsupported(other)),
        }
        Ok(())
    }
}

fn statics(context: &mut MockContext) -> &mut Option<Vec<StackItem>> {
    &mut context.statics
}

fn locals(context: &mut MockContext) -> &mut Option<Vec<StackItem>> {
    &mut context.locals
}

fn arguments(context: &mut MockContext) -> &mut Option<Vec<StackItem>> {
    &mut context.arguments
}

/// Sign-extend a little-endian operand of up to 16 bytes.
fn signed_le(bytes: &[u8]) -> i128 {
    let fill = if bytes.last().is_some_and(|b| b & 0x80 != 0) {
        0xff
    } else {
        0x00
    };
    let mut buf = [fill; 16];
    let n = bytes.len().min(16);
    buf[..n].copy_from_slice(&bytes[..n]);
    i128::from_le_bytes(buf)
}

fn integer_bytes(value: i128) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let bytes = value.to_le_bytes();
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut width = bytes.len();
    while width > 1 && bytes[width - 1] == fill && (bytes[width - 2] & 0x80) == (fill & 0x80) {
        width -= 1;
    }
    bytes[..width].to_vec()
}

impl ExecutionEngine for MockEngine {
    fn state(&self) -> VmState {
        self.state
    }

    fn set_state(&mut self, state: VmState) {
        self.state = state;
    }

    fn load_script(&mut self, script: Vec<u8>) {
        let hash = script_hash(&script);
        self.contexts
            .push(MockContext::new(hash, Arc::new(script), 0, Entry::Script));
    }

    fn execute_next(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.contexts.is_empty() {
            self.state = VmState::Halt;
            return;
        }
        if let Err(fault) = self.step() {
            trace!(%fault, "engine faulted");
            self.fault = Some(FaultInfo {
                message: fault.to_string(),
                stack_trace: None,
            });
            self.state = VmState::Fault;
        }
    }

    fn invocation_depth(&self) -> usize {
        self.contexts.len()
    }

    fn context(&self, index: usize) -> Option<&dyn ExecutionContext> {
        self.contexts
            .iter()
            .rev()
            .nth(index)
            .map(|context| context as &dyn ExecutionContext)
    }

    fn gas_consumed(&self) -> i64 {
        self.gas_consumed
    }

    fn fault(&self) -> Option<&FaultInfo> {
        self.fault.as_ref()
    }

    fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    fn result_stack(&self) -> &[StackItem] {
        &self.result_stack
    }

    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// Builds [`MockEngine`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockEngineFactory;

impl EngineFactory for MockEngineFactory {
    type Engine = MockEngine;

    fn create(
        &self,
        snapshot: Snapshot,
        overrides: &RuntimeOverrides,
        signers: &[Signer],
        gas_limit: i64,
    ) -> MockEngine {
        MockEngine::new(snapshot, overrides.clone(), signers.to_vec(), gas_limit)
    }
}

/// Assembles `(opcode, operand)` pairs into a script.
pub fn assemble(instructions: &[(OpCode, &[u8])]) -> Vec<u8> {
    instructions
        .iter()
        .flat_map(|(opcode, operand)| std::iter::once(*opcode as u8).chain(operand.iter().copied()))
        .collect()
}

/// A deployable contract state with `methods` given as `(name, offset, parameter_count)`.
pub fn contract(
    hash: ContractHash,
    name: &str,
    script: Vec<u8>,
    methods: &[(&str, u32, usize)],
) -> ContractState {
    ContractState {
        id: 1,
        hash,
        name: name.to_string(),
        script,
        methods: methods
            .iter()
            .map(|(name, offset, parameter_count)| ContractMethod {
                name: (*name).to_string(),
                offset: *offset,
                parameter_count: *parameter_count,
            })
            .collect(),
    }
}
