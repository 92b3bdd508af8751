//! Contracts and executors shared by the integration tests.
#![allow(dead_code)]

use neo_debug_mock::{assemble, contract, MockEngineFactory};
use neo_debugger::ledger::Snapshot;
use neo_debugger::runtime::{ContractExecutor, Invocation};
use neo_debugger::vm::{interop_hash, ContractParameter, OpCode, ScriptBuilder};
use neo_debugger::{ContractHash, DebuggerConfig};

pub const CALC_DEBUG_INFO: &str = include_str!("../fixtures/calc.debug.json");
pub const CALC_DUMP: &str = include_str!("../fixtures/calc.nef.txt");
pub const FLOW_DEBUG_INFO: &str = include_str!("../fixtures/flow.debug.json");
pub const FLOW_DUMP: &str = include_str!("../fixtures/flow.nef.txt");

pub fn calc_hash() -> ContractHash {
    ContractHash::from([0xc0; 20])
}

pub fn flow_hash() -> ContractHash {
    ContractHash::from([0xf1; 20])
}

pub fn boom_hash() -> ContractHash {
    ContractHash::from([0xb0; 20])
}

pub fn store_hash() -> ContractHash {
    ContractHash::from([0x5e; 20])
}

/// `main(a) = Double(a) + 1`, `twice() = Seven() + Seven()`.
pub fn calc_script() -> Vec<u8> {
    use OpCode::*;
    assemble(&[
        (INITSLOT, &[1, 1]),
        (LDARG0, &[]),
        (CALL, &[6]),
        (STLOC0, &[]),
        (LDLOC0, &[]),
        (INC, &[]),
        (RET, &[]),
        (INITSLOT, &[0, 1]),
        (LDARG0, &[]),
        (PUSH2, &[]),
        (MUL, &[]),
        (RET, &[]),
        (CALL, &[6]),
        (CALL, &[4]),
        (ADD, &[]),
        (RET, &[]),
        (PUSH7, &[]),
        (RET, &[]),
    ])
}

/// Jumps over offsets 4 and 5.
pub fn flow_script() -> Vec<u8> {
    use OpCode::*;
    assemble(&[
        (PUSH1, &[]),
        (DROP, &[]),
        (JMP, &[4]),
        (NOP, &[]),
        (NOP, &[]),
        (PUSH2, &[]),
        (DROP, &[]),
        (RET, &[]),
    ])
}

/// Logs "about to fail" and then fails an assertion.
pub fn boom_script() -> Vec<u8> {
    let mut builder = ScriptBuilder::new();
    builder
        .emit_push_string("about to fail")
        .emit_syscall(interop_hash("System.Runtime.Log"))
        .emit(OpCode::PUSHF)
        .emit(OpCode::ASSERT)
        .emit(OpCode::RET);
    builder.into_bytes()
}

/// `bump()` stores the block time under key `t` and returns it. `read()` loads it back.
pub fn store_script() -> Vec<u8> {
    let mut builder = ScriptBuilder::new();
    builder
        .emit_syscall(interop_hash("System.Runtime.GetTime"))
        .emit(OpCode::DUP)
        .emit_push_string("t")
        .emit_syscall(interop_hash("System.Storage.Put"))
        .emit(OpCode::RET);
    builder.into_bytes()
}

/// Offset of `read()` inside [`store_script`].
pub fn store_read_offset() -> u32 {
    store_script().len() as u32
}

pub fn store_full_script() -> Vec<u8> {
    let mut script = store_script();
    let mut read = ScriptBuilder::new();
    read.emit_push_string("t")
        .emit_syscall(interop_hash("System.Storage.Get"))
        .emit(OpCode::RET);
    script.extend(read.into_bytes());
    script
}

pub fn chain() -> Snapshot {
    let mut chain = Snapshot::new();
    chain.deploy(contract(
        calc_hash(),
        "Calc",
        calc_script(),
        &[("main", 0, 1), ("double", 10, 1), ("twice", 17, 0)],
    ));
    chain.deploy(contract(flow_hash(), "Flow", flow_script(), &[("main", 0, 0)]));
    chain.deploy(contract(boom_hash(), "Boom", boom_script(), &[("fail", 0, 0)]));
    chain.deploy(contract(
        store_hash(),
        "Store",
        store_full_script(),
        &[("bump", 0, 0), ("read", store_read_offset(), 0)],
    ));
    chain
}

/// An executor over [`chain`] with debug info for `Calc` and `Flow` registered.
pub fn executor() -> ContractExecutor<MockEngineFactory> {
    let executor = ContractExecutor::new(MockEngineFactory, chain(), DebuggerConfig::default());
    executor
        .set_debug_info(calc_hash(), CALC_DEBUG_INFO, CALC_DUMP)
        .expect("calc debug info");
    executor
        .set_debug_info(flow_hash(), FLOW_DEBUG_INFO, FLOW_DUMP)
        .expect("flow debug info");
    executor
}

pub fn call<'a>(
    session: &'a str,
    contract: ContractHash,
    method: &'a str,
    args: &'a [ContractParameter],
) -> Invocation<'a> {
    Invocation {
        session,
        writeback: false,
        contract,
        method,
        args,
        signers: &[],
    }
}
