//! Common test utilities for gshell integration tests

pub use gshell::{parse, ShellState};

/// Fresh state seeded from the test process environment (PATH included).
#[allow(dead_code)]
pub fn fresh_state() -> ShellState {
    ShellState::new()
}

/// Parse and run one line, returning `(status, captured_stdout)`.
#[allow(dead_code)]
pub fn exec(state: &mut ShellState, line: &str) -> (i32, String) {
    let pipeline = parse(line)
        .expect("parse failed")
        .expect("line should not be empty");
    let outcome = gshell::executor::run(state, &pipeline, line);
    state.exit_code = outcome.status;
    (
        outcome.status,
        String::from_utf8_lossy(&outcome.output).into_owned(),
    )
}
