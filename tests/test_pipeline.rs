//! Integration tests for pipeline execution and redirection

#[path = "common/mod.rs"]
mod common;
use common::{exec, fresh_state};

#[test]
fn test_echo_simple() {
    let mut state = fresh_state();
    let (status, out) = exec(&mut state, "echo hello world");
    assert_eq!(status, 0);
    assert_eq!(out, "hello world\n");
}

#[test]
fn test_pipeline_ordering() {
    let mut state = fresh_state();
    let (status, out) = exec(&mut state, "echo a | cat | cat");
    assert_eq!(status, 0);
    assert_eq!(out, "a\n");
}

#[test]
fn test_pipeline_through_externals() {
    let mut state = fresh_state();
    let (status, out) = exec(&mut state, "echo hello | tr a-z A-Z");
    assert_eq!(status, 0);
    assert_eq!(out, "HELLO\n");
}

#[test]
fn test_redirect_round_trip() {
    let mut state = fresh_state();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("f");
    let path = file.to_str().unwrap();

    let (status, out) = exec(&mut state, &format!("echo X > {}", path));
    assert_eq!(status, 0);
    assert!(out.is_empty());

    let (status, out) = exec(&mut state, &format!("cat {}", path));
    assert_eq!(status, 0);
    assert_eq!(out, "X\n");
}

#[test]
fn test_append_accumulates() {
    let mut state = fresh_state();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("log");
    let path = file.to_str().unwrap();

    exec(&mut state, &format!("echo A >> {}", path));
    exec(&mut state, &format!("echo B >> {}", path));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "A\nB\n");
}

#[test]
fn test_stdin_redirect_feeds_pipeline() {
    // cat < in.txt | grep foo >> out.log
    let mut state = fresh_state();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let log = dir.path().join("out.log");
    std::fs::write(&input, "foo\nbar\nfoo baz\n").unwrap();

    let line = format!(
        "cat < {} | grep foo >> {}",
        input.display(),
        log.display()
    );
    let (status, out) = exec(&mut state, &line);
    assert_eq!(status, 0);
    assert!(out.is_empty());
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "foo\nfoo baz\n");

    // appending a second run grows the log
    exec(&mut state, &line);
    assert_eq!(
        std::fs::read_to_string(&log).unwrap(),
        "foo\nfoo baz\nfoo\nfoo baz\n"
    );
}

#[test]
fn test_unknown_command_is_127() {
    let mut state = fresh_state();
    let (status, _) = exec(&mut state, "no-such-binary-for-sure-xyz");
    assert_eq!(status, 127);
}

#[test]
fn test_unsafe_write_rejected() {
    let mut state = fresh_state();
    let (status, _) = exec(&mut state, "echo x > /bin/should-not-appear");
    assert_ne!(status, 0);
    assert!(!std::path::Path::new("/bin/should-not-appear").exists());
}

#[test]
fn test_variable_expansion_sequence() {
    // export A=1; echo $A; unset A; echo $A
    let mut state = fresh_state();
    exec(&mut state, "export A=1");
    let (_, out) = exec(&mut state, "echo $A");
    assert_eq!(out, "1\n");
    exec(&mut state, "unset A");
    let (status, out) = exec(&mut state, "echo $A");
    assert_eq!(status, 0);
    assert_eq!(out, "\n");
}

#[test]
fn test_single_quotes_reach_argv_untouched() {
    let mut state = fresh_state();
    let (_, out) = exec(&mut state, "echo '$HOME | literal'");
    assert_eq!(out, "$HOME | literal\n");
}

#[test]
fn test_last_status_variable() {
    let mut state = fresh_state();
    exec(&mut state, "no-such-binary-for-sure-xyz");
    let (_, out) = exec(&mut state, "echo $?");
    assert_eq!(out, "127\n");
}

#[test]
fn test_alias_is_not_recursive_end_to_end() {
    let mut state = fresh_state();
    state.set_alias("ll", "echo -n aliased").unwrap();
    state.set_alias("echo", "ll").unwrap();
    let (status, out) = exec(&mut state, "ll once");
    assert_eq!(status, 0);
    assert_eq!(out, "aliased once");
}

#[test]
fn test_parse_errors_do_not_run_anything() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let line = format!("echo x > {} | 'unclosed", marker.display());
    assert!(gshell::parse(&line).is_err());
    assert!(!marker.exists());
}
