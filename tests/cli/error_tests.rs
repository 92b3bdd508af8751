use super::common::*;
use predicates::prelude::*;
use std::io::Write;

#[test]
fn missing_debug_info_file_fails() {
    neo_debug()
        .args(["inspect", "--debug-info", "tests/fixtures/absent.debug.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"))
        .stderr(predicate::str::contains("absent.debug.json"));
}

#[test]
fn unknown_mnemonic_in_dump_fails() {
    let mut dump = tempfile::NamedTempFile::new().unwrap();
    writeln!(dump, "0000 PUSH1\n0001 FROB\n0002 RET").unwrap();

    neo_debug()
        .args(["inspect", "--debug-info", CALC_DEBUG_INFO, "--dump"])
        .arg(dump.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown opcode 'FROB' at dump line 2"));
}

#[test]
fn malformed_config_is_rejected() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "max_gas = 10\nbogus = true").unwrap();

    neo_debug()
        .arg("--config")
        .arg(config.path())
        .args(["inspect", "--debug-info", CALC_DEBUG_INFO])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bogus"));
}

#[test]
fn verbose_and_quiet_conflict() {
    neo_debug()
        .args(["-v", "-q", "inspect", "--debug-info", CALC_DEBUG_INFO])
        .assert()
        .failure();
}
