//! Building invocation scripts and the engines that run them.

use tracing::{debug, info};

use crate::ledger::{ContractState, Snapshot};
use crate::session::DebugSession;
use crate::types::ContractHash;
use crate::vm::{ContractParameter, EngineFactory, ExecutionEngine, ScriptBuilder, Signer};
use crate::{DebuggerError, Result};

/// Entry script calling `method` on `contract` through `System.Contract.Call`.
pub fn invocation_script(
    contract: &ContractHash,
    method: &str,
    args: &[ContractParameter],
) -> Vec<u8> {
    let mut builder = ScriptBuilder::new();
    builder.emit_dynamic_call(contract, method, args);
    builder.into_bytes()
}

/// Check that `contract` is deployed and exposes `method` with `args.len()` parameters.
pub fn resolve_target(
    snapshot: &Snapshot,
    contract: &ContractHash,
    method: &str,
    args: &[ContractParameter],
) -> Result<ContractState> {
    let state = snapshot
        .contract(contract)
        .ok_or(DebuggerError::ContractNotFound(*contract))?;
    if state.method(method, args.len()).is_none() {
        return Err(DebuggerError::MethodNotFound {
            contract: *contract,
            method: method.to_string(),
            parameter_count: args.len(),
        }
        .into());
    }
    Ok(state)
}

/// Validate the target and build an engine with the entry script loaded.
///
/// The engine runs over a private fork of the session state.
#[tracing::instrument(skip_all, fields(session = session.name(), contract = %contract, method = method))]
pub fn prepare_engine<F: EngineFactory>(
    factory: &F,
    session: &DebugSession<F::Engine>,
    contract: &ContractHash,
    method: &str,
    args: &[ContractParameter],
    signers: &[Signer],
    gas_limit: i64,
) -> Result<F::Engine> {
    let state = resolve_target(session.snapshot(), contract, method, args)?;
    let script = invocation_script(contract, method, args);
    debug!(script = %hex::encode(&script), "built invocation script");

    let mut engine = factory.create(session.fork(), &session.overrides, signers, gas_limit);
    engine.load_script(script);
    info!(name = %state.name, args = args.len(), "prepared engine");
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ContractMethod;
    use crate::vm::{OpCode, CONTRACT_CALL};

    fn deployed() -> (Snapshot, ContractHash) {
        let hash = ContractHash::from([0x11; 20]);
        let mut snapshot = Snapshot::new();
        snapshot.deploy(ContractState {
            id: 1,
            hash,
            name: "Demo".to_string(),
            script: vec![OpCode::RET as u8],
            methods: vec![ContractMethod {
                name: "main".to_string(),
                offset: 0,
                parameter_count: 1,
            }],
        });
        (snapshot, hash)
    }

    #[test]
    fn script_ends_with_contract_call() {
        let script = invocation_script(&ContractHash::default(), "main", &[]);
        let mut tail = vec![OpCode::SYSCALL as u8];
        tail.extend_from_slice(&CONTRACT_CALL.to_le_bytes());
        assert!(script.ends_with(&tail));
        assert_eq!(script[0], OpCode::NEWARRAY0 as u8);
    }

    #[test]
    fn target_resolution_checks_contract_and_arity() {
        let (snapshot, hash) = deployed();
        let one = [ContractParameter::Integer(1)];
        assert_eq!(resolve_target(&snapshot, &hash, "main", &one).unwrap().name, "Demo");

        let err = resolve_target(&snapshot, &hash, "main", &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DebuggerError>(),
            Some(DebuggerError::MethodNotFound { parameter_count: 0, .. })
        ));

        let err = resolve_target(&snapshot, &ContractHash::default(), "main", &one).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DebuggerError>(),
            Some(DebuggerError::ContractNotFound(_))
        ));
    }
}
