use super::common::*;
use predicates::prelude::*;

#[test]
fn valid_locations_resolve_to_offsets() {
    neo_debug()
        .args([
            "check-breakpoints",
            "--debug-info",
            CALC_DEBUG_INFO,
            "calc.cs:5",
            "calc.cs:10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("calc.cs:5  offset 3"))
        .stdout(predicate::str::contains("calc.cs:10  offset 13"));
}

#[test]
fn invalid_location_fails_the_command() {
    neo_debug()
        .args([
            "check-breakpoints",
            "--debug-info",
            CALC_DEBUG_INFO,
            "calc.cs:5",
            "calc.cs:7",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("calc.cs:7  no code generated"))
        .stderr(predicate::str::contains("no code is generated for calc.cs line 7"));
}

#[test]
fn location_requires_line_number() {
    neo_debug()
        .args(["check-breakpoints", "--debug-info", CALC_DEBUG_INFO, "calc.cs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected <file>:<line>"));
}
