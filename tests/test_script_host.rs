//! Integration tests for the rc scripting host

use gshell::script::ScriptHost;
use gshell::ShellState;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

fn run_rc_source(source: &str) -> (Rc<RefCell<ShellState>>, Result<(), gshell::script::ScriptError>) {
    let dir = tempfile::tempdir().unwrap();
    let rc = dir.path().join("rc.rhai");
    std::fs::write(&rc, source).unwrap();
    let state = Rc::new(RefCell::new(ShellState::new()));
    let result = ScriptHost::new().run_rc(&rc, &state);
    (state, result)
}

#[test]
fn test_rc_configures_aliases_env_and_history() {
    let (state, result) = run_rc_source(
        r#"
            setenv("EDITOR", "vim");
            alias("gs", "git status");
            set_history_size(500);
        "#,
    );
    result.unwrap();
    let state = state.borrow();
    assert_eq!(state.get_var("EDITOR"), Some("vim"));
    assert_eq!(state.get_alias("gs"), Some("git status"));
    assert_eq!(state.history_size, 500);
}

#[test]
fn test_exec_from_script_updates_exit_code() {
    let (state, result) = run_rc_source(
        r#"
            let ok = exec("export FROM_RC=1");
            if !ok { throw "should have succeeded"; }
        "#,
    );
    result.unwrap();
    assert_eq!(state.borrow().get_var("FROM_RC"), Some("1"));
    assert_eq!(state.borrow().exit_code, 0);
}

#[test]
fn test_filesystem_surface() {
    let dir = tempfile::tempdir().unwrap();
    let probe = dir.path().join("probe.txt");
    let source = format!(
        r#"
            if !is_dir("{dir}") {{ throw "dir"; }}
            if !write_file("{probe}", "payload") {{ throw "write"; }}
            if read_file("{probe}") != "payload" {{ throw "read"; }}
            if !path_exists("{probe}") {{ throw "exists"; }}
            setenv("FILES_SEEN", list_files("{dir}").len().to_string());
        "#,
        dir = dir.path().display(),
        probe = probe.display(),
    );
    let (state, result) = run_rc_source(&source);
    result.unwrap();
    assert_eq!(state.borrow().get_var("FILES_SEEN"), Some("1"));
    assert_eq!(std::fs::read_to_string(&probe).unwrap(), "payload");
}

#[test]
fn test_system_paths_are_write_protected() {
    let (_, result) = run_rc_source(
        r#"
            if write_file("/usr/bin/gshell-script-probe", "x") {
                throw "write into /usr/bin must fail";
            }
        "#,
    );
    result.unwrap();
    assert!(!Path::new("/usr/bin/gshell-script-probe").exists());
}

#[test]
fn test_host_failures_return_values_not_exceptions() {
    let (state, result) = run_rc_source(
        r#"
            if setenv("bad name", "x") { throw "setenv"; }
            if unalias("never-was-set") { throw "unalias"; }
            if exec("echo 'unterminated") { throw "exec"; }
            if read_file("/definitely/missing") != () { throw "read_file"; }
            setenv("SURVIVED", "yes");
        "#,
    );
    result.unwrap();
    assert_eq!(state.borrow().get_var("SURVIVED"), Some("yes"));
}

#[test]
fn test_command_exists_finds_builtins_and_path() {
    let (state, result) = run_rc_source(
        r#"
            setenv("HAS_CD", command_exists("cd").to_string());
            setenv("HAS_SH", command_exists("sh").to_string());
            setenv("HAS_NOPE", command_exists("no-such-binary-for-sure-xyz").to_string());
        "#,
    );
    result.unwrap();
    let state = state.borrow();
    assert_eq!(state.get_var("HAS_CD"), Some("true"));
    assert_eq!(state.get_var("HAS_SH"), Some("true"));
    assert_eq!(state.get_var("HAS_NOPE"), Some("false"));
}

#[test]
fn test_plugin_loads_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = dir.path().join("plugin.rhai");
    std::fs::write(&plugin, r#"alias("from-plugin", "echo plugin");"#).unwrap();

    let source = format!(
        r#"
            if !enable_plugin("demo", "{plugin}") {{ throw "load"; }}
            if !plugin_loaded("demo") {{ throw "loaded"; }}
            if !disable_plugin("demo") {{ throw "disable"; }}
            if plugin_loaded("demo") {{ throw "still loaded"; }}
        "#,
        plugin = plugin.display(),
    );
    let (state, result) = run_rc_source(&source);
    result.unwrap();
    assert_eq!(state.borrow().get_alias("from-plugin"), Some("echo plugin"));
}

#[test]
fn test_broken_plugin_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = dir.path().join("plugin.rhai");
    std::fs::write(&plugin, "this is not rhai ][").unwrap();

    let source = format!(
        r#"
            if enable_plugin("broken", "{plugin}") {{ throw "must fail"; }}
            setenv("RC_CONTINUED", "yes");
        "#,
        plugin = plugin.display(),
    );
    let (state, result) = run_rc_source(&source);
    result.unwrap();
    assert_eq!(state.borrow().get_var("RC_CONTINUED"), Some("yes"));
}
