use super::common::neo_debug;
use predicates::prelude::*;

#[test]
fn top_level_help_lists_commands() {
    neo_debug()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("check-breakpoints"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn version_flag_prints_package_version() {
    neo_debug()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    neo_debug()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
