mod common;

use common::*;
use neo_debug_mock::MockEngineFactory;
use neo_debugger::runtime::{ContractExecutor, Invocation, InvocationRequest, StackDump};
use neo_debugger::vm::{ContractParameter, VmState};
use neo_debugger::{DebuggerConfig, DebuggerError, SourceLocation};
use serde_json::{json, Value};

fn stored(executor: &ContractExecutor<MockEngineFactory>, session: &str) -> Value {
    let report = executor
        .invoke(&call(session, store_hash(), "read", &[]))
        .unwrap();
    assert_eq!(report.state, VmState::Halt);
    match report.stack {
        StackDump::Items(mut items) => items.remove(0),
        StackDump::Error { error } => panic!("{error}"),
    }
}

fn bump(session: &str) -> Invocation<'_> {
    Invocation {
        writeback: true,
        ..call(session, store_hash(), "bump", &[])
    }
}

fn error_of(err: anyhow::Error) -> DebuggerError {
    err.downcast::<DebuggerError>().expect("debugger error")
}

fn empty() -> Value {
    json!({ "type": "Any" })
}

#[test]
fn writeback_is_visible_only_in_its_session() {
    let executor = executor();
    executor.set_session_timestamp("a", Some(1000));

    let report = executor.invoke(&bump("a")).unwrap();
    assert_eq!(report.state, VmState::Halt);

    assert_eq!(
        stored(&executor, "a"),
        json!({ "type": "ByteString", "value": "6AM=" })
    );
    assert_eq!(stored(&executor, "b"), empty());
}

#[test]
fn invocation_without_writeback_leaves_session_untouched() {
    let executor = executor();
    let request = call("a", store_hash(), "bump", &[]);
    executor.invoke(&request).unwrap();
    assert_eq!(stored(&executor, "a"), empty());
}

#[test]
fn debug_writeback_happens_on_halt_only() {
    let executor = executor();
    executor.set_session_timestamp("a", Some(1000));
    // Speculative: Store has no debug info.
    executor.set_assembly_breakpoints(&store_hash(), &[5]).unwrap();

    let report = executor.start_debug(&bump("a")).unwrap();
    assert_eq!(report.state, VmState::Break);
    assert_eq!(report.instruction_pointer, Some(5));
    assert_eq!(stored(&executor, "a"), empty());

    let report = executor.continue_execution("a").unwrap();
    assert_eq!(report.state, VmState::Halt);
    assert_eq!(
        stored(&executor, "a"),
        json!({ "type": "ByteString", "value": "6AM=" })
    );

    // The halted engine cannot be resumed or committed again.
    assert!(executor.continue_execution("a").is_err());
}

#[test]
fn timestamps_come_from_config_then_session() {
    let config = DebuggerConfig {
        default_timestamp: Some(7),
        ..DebuggerConfig::default()
    };
    let executor = ContractExecutor::new(MockEngineFactory, chain(), config);

    let report = executor
        .invoke(&call("a", store_hash(), "bump", &[]))
        .unwrap();
    assert_eq!(report.stack, StackDump::Items(vec![json!({ "type": "Integer", "value": "7" })]));

    executor.set_session_timestamp("a", Some(9));
    let timestamps = executor.get_session_timestamp(&["a".to_string(), "fresh".to_string()]);
    assert_eq!(timestamps["a"], Some(9));
    assert_eq!(timestamps["fresh"], Some(7));
}

#[test]
fn copy_forks_state_and_rename_moves_it() {
    let executor = executor();
    executor.set_session_timestamp("a", Some(1000));
    executor.invoke(&bump("a")).unwrap();

    executor.copy_session("a", "c").unwrap();
    assert_eq!(stored(&executor, "c"), stored(&executor, "a"));

    executor.set_session_timestamp("c", Some(1));
    executor.invoke(&bump("c")).unwrap();
    assert_eq!(stored(&executor, "c"), json!({ "type": "ByteString", "value": "AQ==" }));
    assert_eq!(stored(&executor, "a"), json!({ "type": "ByteString", "value": "6AM=" }));

    executor.rename_session("a", "z").unwrap();
    let sessions = executor.list_sessions();
    assert!(sessions.contains(&"z".to_string()));
    assert!(!sessions.contains(&"a".to_string()));
    assert_eq!(stored(&executor, "z"), json!({ "type": "ByteString", "value": "6AM=" }));
}

#[test]
fn copy_and_rename_refuse_to_overwrite() {
    let executor = executor();
    executor.new_sessions_from_chain(&["a".to_string(), "b".to_string()]);

    assert_eq!(
        error_of(executor.copy_session("a", "b").unwrap_err()),
        DebuggerError::SessionExists("b".to_string())
    );
    assert_eq!(
        error_of(executor.rename_session("a", "b").unwrap_err()),
        DebuggerError::SessionExists("b".to_string())
    );
    assert_eq!(
        error_of(executor.rename_session("missing", "x").unwrap_err()),
        DebuggerError::SessionNotFound("missing".to_string())
    );
}

#[test]
fn new_sessions_from_chain_discards_state() {
    let executor = executor();
    executor.set_session_timestamp("a", Some(1000));
    executor.invoke(&bump("a")).unwrap();

    let created = executor.new_sessions_from_chain(&["a".to_string()]);
    assert_eq!(created, vec!["a".to_string()]);
    assert_eq!(stored(&executor, "a"), empty());
}

#[test]
fn delete_reports_which_sessions_existed() {
    let executor = executor();
    executor.new_sessions_from_chain(&["a".to_string()]);

    let deleted = executor.delete_sessions(&["a".to_string(), "zz".to_string()]);
    assert_eq!(deleted["a"], true);
    assert_eq!(deleted["zz"], false);
    assert!(executor.list_sessions().is_empty());
}

#[test]
fn starting_a_new_debug_supersedes_the_old_one() {
    let executor = executor();
    executor.set_assembly_breakpoints(&flow_hash(), &[1]).unwrap();
    executor.set_assembly_breakpoints(&calc_hash(), &[13]).unwrap();

    executor
        .start_debug(&call("s", flow_hash(), "main", &[]))
        .unwrap();
    let args = [ContractParameter::Integer(3)];
    let report = executor
        .start_debug(&call("s", calc_hash(), "main", &args))
        .unwrap();
    assert_eq!(report.script_hash, Some(calc_hash()));
    assert_eq!(executor.get_instruction_pointer("s", 0).unwrap(), 13);
}

#[test]
fn invoking_unknown_targets_fails_before_execution() {
    let executor = executor();

    let missing = neo_debugger::ContractHash::from([0x99; 20]);
    assert_eq!(
        error_of(executor.invoke(&call("s", missing, "main", &[])).unwrap_err()),
        DebuggerError::ContractNotFound(missing)
    );

    let err = error_of(executor.invoke(&call("s", calc_hash(), "main", &[])).unwrap_err());
    assert!(matches!(
        err,
        DebuggerError::MethodNotFound { parameter_count: 0, .. }
    ));
}

#[test]
fn missing_debug_info_names_the_deployed_contract() {
    let executor = executor();

    let err = error_of(executor.get_coverage(&store_hash()).unwrap_err());
    assert_eq!(
        err,
        DebuggerError::NotRegisteredContract {
            contract: store_hash(),
            name: Some("Store".to_string()),
        }
    );
    assert!(err.to_string().ends_with("(Store)"));

    let err = error_of(
        executor
            .set_source_breakpoints(&store_hash(), &[SourceLocation::new("store.cs", 1)])
            .unwrap_err(),
    );
    assert!(matches!(err, DebuggerError::NotRegisteredContract { .. }));
}

#[test]
fn breakpoints_are_validated_against_debug_info() {
    let executor = executor();

    let err = error_of(
        executor
            .set_source_breakpoints(&calc_hash(), &[SourceLocation::new("calc.cs", 7)])
            .unwrap_err(),
    );
    assert_eq!(
        err,
        DebuggerError::InvalidLocation {
            file: "calc.cs".to_string(),
            line: 7,
        }
    );

    let err = error_of(
        executor
            .set_assembly_breakpoints(&calc_hash(), &[1])
            .unwrap_err(),
    );
    assert_eq!(
        err,
        DebuggerError::InvalidOffset {
            contract: calc_hash(),
            offset: 1,
        }
    );
}

#[test]
fn deleting_debug_info_drops_breakpoints_and_coverage() {
    let executor = executor();
    executor
        .set_source_breakpoints(&calc_hash(), &[SourceLocation::new("calc.cs", 6)])
        .unwrap();
    executor.set_assembly_breakpoints(&calc_hash(), &[7]).unwrap();

    let deleted = executor.delete_debug_info(&[calc_hash(), store_hash()]);
    assert_eq!(deleted[&calc_hash()], true);
    assert_eq!(deleted[&store_hash()], false);

    assert!(executor.list_assembly_breakpoints(&calc_hash()).is_empty());
    assert!(executor.get_coverage(&calc_hash()).is_err());
    assert_eq!(executor.list_debug_info(), vec![flow_hash()]);

    let args = [ContractParameter::Integer(1)];
    let report = executor
        .start_debug(&call("s", calc_hash(), "main", &args))
        .unwrap();
    assert_eq!(report.state, VmState::Halt);
}

#[test]
fn repeated_offsets_report_their_first_result() {
    let executor = executor();

    let added = executor.set_assembly_breakpoints(&calc_hash(), &[3, 3]).unwrap();
    assert_eq!(added.get(&3), Some(&true));
    assert_eq!(executor.list_assembly_breakpoints(&calc_hash()), vec![3]);

    let removed = executor.delete_assembly_breakpoints(&calc_hash(), &[3, 3]);
    assert_eq!(removed.get(&3), Some(&true));
    assert!(executor.list_assembly_breakpoints(&calc_hash()).is_empty());
}

#[test]
fn json_request_runs_like_a_typed_invocation() {
    let executor = executor();
    let request = InvocationRequest::from_json(
        "a",
        calc_hash(),
        "main",
        r#"[{"type": "Integer", "value": "5"}]"#,
        Some(r#"[{"account": "0x0102030405060708090a0b0c0d0e0f1011121314"}]"#),
    )
    .unwrap();
    assert_eq!(request.signers.len(), 1);

    let report = executor.invoke(&request.invocation()).unwrap();
    assert_eq!(report.state, VmState::Halt);
    assert_eq!(
        report.stack,
        StackDump::Items(vec![json!({ "type": "Integer", "value": "11" })])
    );

    let err = InvocationRequest::from_json("a", calc_hash(), "main", "[1", None).unwrap_err();
    assert!(matches!(
        error_of(err),
        DebuggerError::InvalidArguments(_)
    ));
}

#[test]
fn json_request_writeback_commits_into_the_session() {
    let executor = executor();
    executor.set_session_timestamp("a", Some(1000));
    let request = InvocationRequest::from_json("a", store_hash(), "bump", "[]", None)
        .unwrap()
        .with_writeback(true);

    executor.invoke(&request.invocation()).unwrap();
    assert_eq!(
        stored(&executor, "a"),
        json!({ "type": "ByteString", "value": "6AM=" })
    );
}
