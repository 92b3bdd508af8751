use super::common::*;
use predicates::prelude::*;
use serde_json::Value;

#[test]
fn inspect_text_summarises_artifacts() {
    neo_debug()
        .args(["inspect", "--debug-info", CALC_DEBUG_INFO, "--dump", CALC_DUMP])
        .assert()
        .success()
        .stdout(predicate::str::contains("Demo.Calc,main(a)"))
        .stdout(predicate::str::contains("Demo.Calc,Double(v)"))
        .stdout(predicate::str::contains("calc.cs"))
        .stdout(predicate::str::contains("18 instructions, 5 line starts"))
        .stdout(predicate::str::contains("return v * 2;"));
}

#[test]
fn inspect_finds_sibling_dump() {
    neo_debug()
        .args(["inspect", "--debug-info", CALC_DEBUG_INFO])
        .assert()
        .success()
        .stdout(predicate::str::contains("18 instructions"));
}

#[test]
fn quiet_inspect_omits_line_table() {
    neo_debug()
        .args(["-q", "inspect", "--debug-info", CALC_DEBUG_INFO])
        .assert()
        .success()
        .stdout(predicate::str::contains("return v * 2;").not());
}

#[test]
fn inspect_json_reports_line_starts() {
    let output = neo_debug()
        .args(["inspect", "--debug-info", CALC_DEBUG_INFO, "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["instructionCount"], 18);
    assert_eq!(json["filenames"], serde_json::json!(["calc.cs"]));
    assert_eq!(json["methods"][1]["range"], "10-16");
    assert_eq!(json["methods"][0]["variables"], serde_json::json!(["x"]));

    let starts = json["lineStarts"].as_array().unwrap();
    let offsets: Vec<u64> = starts.iter().map(|s| s["offset"].as_u64().unwrap()).collect();
    assert_eq!(offsets, vec![3, 7, 13, 17, 23]);
    assert_eq!(starts[2]["line"], 10);
}
