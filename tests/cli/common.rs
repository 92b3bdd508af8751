use assert_cmd::Command;

pub const CALC_DEBUG_INFO: &str = "tests/fixtures/calc.debug.json";
pub const CALC_DUMP: &str = "tests/fixtures/calc.nef.txt";

/// The `neo-debug` binary with colors disabled and no user configuration.
pub fn neo_debug() -> Command {
    let mut cmd = Command::cargo_bin("neo-debug").expect("binary is built");
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("NEO_DEBUGGER_CONFIG");
    cmd
}
