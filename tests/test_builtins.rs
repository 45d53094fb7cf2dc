//! Integration tests for builtin commands running through the executor

#[path = "common/mod.rs"]
mod common;
use common::{exec, fresh_state};

#[test]
fn test_export_listing_is_sorted() {
    let mut state = fresh_state();
    exec(&mut state, "export ZZ_LAST=z");
    exec(&mut state, "export AA_FIRST=a");
    let (_, out) = exec(&mut state, "export");
    let first = out.lines().position(|l| l.starts_with("AA_FIRST="));
    let last = out.lines().position(|l| l.starts_with("ZZ_LAST="));
    assert!(first.unwrap() < last.unwrap());
}

#[test]
fn test_export_invalid_name_fails() {
    let mut state = fresh_state();
    let (status, _) = exec(&mut state, "export 'not a name=1'");
    assert_eq!(status, 1);
}

#[test]
fn test_alias_builtin_round_trip() {
    let mut state = fresh_state();
    let (status, _) = exec(&mut state, "alias gs='git status'");
    assert_eq!(status, 0);
    let (_, out) = exec(&mut state, "alias gs");
    assert_eq!(out, "alias gs='git status'\n");
    let (status, _) = exec(&mut state, "unalias gs");
    assert_eq!(status, 0);
    let (status, _) = exec(&mut state, "unalias gs");
    assert_eq!(status, 1);
}

#[test]
fn test_cd_changes_directory_for_children() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().canonicalize().unwrap();
    let mut state = fresh_state();
    let original = std::env::current_dir().unwrap();

    let (status, _) = exec(&mut state, &format!("cd {}", target.display()));
    assert_eq!(status, 0);
    let (_, out) = exec(&mut state, "pwd");
    assert_eq!(out.trim_end(), target.display().to_string());

    std::env::set_current_dir(original).unwrap();
}

#[test]
fn test_source_stops_at_first_failure() {
    let mut state = fresh_state();
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("setup.gsh");
    let marker = dir.path().join("marker");
    std::fs::write(
        &script,
        format!(
            "export SOURCED=yes\nno-such-binary-for-sure-xyz\necho no > {}\n",
            marker.display()
        ),
    )
    .unwrap();

    let (status, _) = exec(&mut state, &format!("source {}", script.display()));
    assert_eq!(status, 127);
    assert_eq!(state.get_var("SOURCED"), Some("yes"));
    assert!(!marker.exists());
}

#[test]
fn test_source_collects_output() {
    let mut state = fresh_state();
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("lines.gsh");
    std::fs::write(&script, "echo one\n# comment\necho two\n").unwrap();

    let (status, out) = exec(&mut state, &format!("source {}", script.display()));
    assert_eq!(status, 0);
    assert_eq!(out, "one\ntwo\n");
}

#[test]
fn test_exit_carries_status_through_state() {
    let mut state = fresh_state();
    let (status, _) = exec(&mut state, "exit 42");
    assert_eq!(status, 42);
    assert!(state.should_exit);
    assert_eq!(state.exit_code, 42);
}

#[test]
fn test_jobs_empty_table() {
    let mut state = fresh_state();
    let (status, out) = exec(&mut state, "jobs");
    assert_eq!(status, 0);
    assert!(out.is_empty());
}

#[test]
fn test_background_then_jobs_lists_it() {
    let mut state = fresh_state();
    let (status, _) = exec(&mut state, "sleep 0.2 &");
    assert_eq!(status, 0);
    let (_, out) = exec(&mut state, "jobs");
    assert!(out.contains("running"));
    assert!(out.contains("sleep 0.2 &"));

    let pid = state.jobs()[0].pid;
    assert_eq!(gshell::signals::wait_for(pid), 0);
}

#[test]
fn test_help_mentions_every_builtin_family() {
    let mut state = fresh_state();
    let (status, out) = exec(&mut state, "help");
    assert_eq!(status, 0);
    for needle in ["cd", "export", "alias", "jobs", "history", "source", "exit"] {
        assert!(out.contains(needle), "help is missing {}", needle);
    }
}
