//! Builtin commands
//!
//! Builtins run inside the shell process and are resolved before any
//! fork/exec. Each handler takes the shell state, the expanded argv and
//! the stage's stdin bytes, and returns a status plus captured output.
//! Diagnostics go straight to stderr, which every stage inherits.

mod net;

use std::env;
use std::fs;
use std::path::PathBuf;

use crate::history;
use crate::signals;
use crate::state::{JobStatus, ShellState};

/// What a builtin hands back to the executor.
#[derive(Debug, Default)]
pub struct BuiltinOutput {
    pub status: i32,
    pub output: Vec<u8>,
}

impl BuiltinOutput {
    pub fn ok(output: impl Into<Vec<u8>>) -> Self {
        BuiltinOutput {
            status: 0,
            output: output.into(),
        }
    }

    pub fn fail(status: i32) -> Self {
        BuiltinOutput {
            status,
            output: Vec::new(),
        }
    }
}

pub type BuiltinFn = fn(&mut ShellState, &[String], &[u8]) -> BuiltinOutput;

/// Resolve a command name against the fixed builtin set.
pub fn lookup(name: &str) -> Option<BuiltinFn> {
    Some(match name {
        "cd" => cd,
        "pwd" => pwd,
        "echo" => echo,
        "export" => export,
        "unset" => unset,
        "alias" => alias,
        "unalias" => unalias,
        "exit" => exit,
        "jobs" => jobs,
        "fg" => fg,
        "bg" => bg,
        "history" => history_cmd,
        "source" => source,
        "help" => help,
        "net-test" => net::net_test,
        "net-resolve" => net::net_resolve,
        "net-fetch" => net::net_fetch,
        "net-scan" => net::net_scan,
        _ => return None,
    })
}

fn cd(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let target = match argv.get(1) {
        Some(dir) => PathBuf::from(dir),
        None => match state.get_var("HOME") {
            Some(home) => PathBuf::from(home),
            None => {
                eprintln!("cd: HOME not set");
                return BuiltinOutput::fail(1);
            }
        },
    };
    match env::set_current_dir(&target) {
        Ok(()) => BuiltinOutput::ok(Vec::new()),
        Err(e) => {
            eprintln!("cd: {}: {}", target.display(), e);
            BuiltinOutput::fail(1)
        }
    }
}

fn pwd(_state: &mut ShellState, _argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    match env::current_dir() {
        Ok(dir) => BuiltinOutput::ok(format!("{}\n", dir.display())),
        Err(e) => {
            eprintln!("pwd: {}", e);
            BuiltinOutput::fail(1)
        }
    }
}

fn echo(_state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let (args, newline) = match argv.get(1).map(|s| s.as_str()) {
        Some("-n") => (&argv[2..], false),
        _ => (&argv[1..], true),
    };
    let mut out = args.join(" ");
    if newline {
        out.push('\n');
    }
    BuiltinOutput::ok(out)
}

fn export(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    if argv.len() == 1 {
        let mut out = String::new();
        for (name, value) in state.env_sorted() {
            out.push_str(&format!("{}={}\n", name, value));
        }
        return BuiltinOutput::ok(out);
    }
    for assignment in &argv[1..] {
        let (name, value) = match assignment.split_once('=') {
            Some((n, v)) => (n, v.to_string()),
            None => (
                assignment.as_str(),
                state.get_var(assignment).unwrap_or_default().to_string(),
            ),
        };
        if state.set_var(name, &value).is_err() {
            eprintln!("export: invalid name: {:?}", name);
            return BuiltinOutput::fail(1);
        }
    }
    BuiltinOutput::ok(Vec::new())
}

fn unset(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    for name in &argv[1..] {
        state.unset_var(name);
    }
    BuiltinOutput::ok(Vec::new())
}

fn alias(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    if argv.len() == 1 {
        let mut out = String::new();
        for (name, expansion) in state.aliases_sorted() {
            out.push_str(&format!("alias {}='{}'\n", name, expansion));
        }
        return BuiltinOutput::ok(out);
    }
    let mut status = 0;
    let mut out = String::new();
    for assignment in &argv[1..] {
        match assignment.split_once('=') {
            Some((name, expansion)) => {
                if state.set_alias(name, expansion).is_err() {
                    eprintln!("alias: invalid name: {:?}", name);
                    status = 1;
                }
            }
            None => match state.get_alias(assignment) {
                Some(expansion) => {
                    out.push_str(&format!("alias {}='{}'\n", assignment, expansion))
                }
                None => {
                    eprintln!("alias: {}: not found", assignment);
                    status = 1;
                }
            },
        }
    }
    BuiltinOutput { status, output: out.into_bytes() }
}

fn unalias(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    if argv.get(1).map(|s| s.as_str()) == Some("-a") {
        state.clear_aliases();
        return BuiltinOutput::ok(Vec::new());
    }
    let mut status = 0;
    for name in &argv[1..] {
        if !state.remove_alias(name) {
            eprintln!("unalias: {}: not found", name);
            status = 1;
        }
    }
    BuiltinOutput::fail(status)
}

fn exit(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let code = argv
        .get(1)
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(state.exit_code);
    state.should_exit = true;
    state.exit_code = code;
    BuiltinOutput::fail(code)
}

fn jobs(state: &mut ShellState, _argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let mut out = String::new();
    for job in state.jobs() {
        out.push_str(&format!(
            "[{}] {}  {}\n",
            job.id,
            job.status.as_str(),
            job.command
        ));
    }
    // listing acknowledges finished jobs
    state.reap_done_jobs();
    BuiltinOutput::ok(out)
}

/// Resolve `%N`, `N`, or default to the most recent job.
fn job_ref(state: &ShellState, argv: &[String]) -> Option<u32> {
    match argv.get(1) {
        Some(arg) => arg.trim_start_matches('%').parse::<u32>().ok(),
        None => state.last_job_id(),
    }
}

fn fg(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let id = match job_ref(state, argv) {
        Some(id) => id,
        None => {
            eprintln!("fg: no current job");
            return BuiltinOutput::fail(1);
        }
    };
    let (pid, command) = match state.job_mut(id) {
        Some(job) => (job.pid, job.command.clone()),
        None => {
            eprintln!("fg: %{}: no such job", id);
            return BuiltinOutput::fail(1);
        }
    };
    if let Err(e) = signals::continue_process(pid) {
        eprintln!("fg: {}", e);
        return BuiltinOutput::fail(1);
    }
    let status = signals::wait_for(pid);
    state.mark_job_done(pid);
    state.reap_done_jobs();
    BuiltinOutput {
        status,
        output: format!("{}\n", command).into_bytes(),
    }
}

fn bg(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let id = match job_ref(state, argv) {
        Some(id) => id,
        None => {
            eprintln!("bg: no current job");
            return BuiltinOutput::fail(1);
        }
    };
    match state.job_mut(id) {
        Some(job) => {
            if let Err(e) = signals::continue_process(job.pid) {
                eprintln!("bg: {}", e);
                return BuiltinOutput::fail(1);
            }
            job.status = JobStatus::Running;
            BuiltinOutput::ok(format!("[{}] {} &\n", job.id, job.command))
        }
        None => {
            eprintln!("bg: %{}: no such job", id);
            BuiltinOutput::fail(1)
        }
    }
}

fn history_cmd(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let limit = argv
        .get(1)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(state.history_size);
    let path = match &state.history_file {
        Some(path) => path.clone(),
        None => return BuiltinOutput::ok(Vec::new()),
    };
    match history::read_recent(&path, limit) {
        Ok(entries) => {
            let mut out = String::new();
            for (i, entry) in entries.iter().enumerate() {
                out.push_str(&format!("{:>5}  {}\n", i + 1, entry.command));
            }
            BuiltinOutput::ok(out)
        }
        Err(e) => {
            eprintln!("history: {}", e);
            BuiltinOutput::fail(1)
        }
    }
}

fn source(state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let path = match argv.get(1) {
        Some(path) => path,
        None => {
            eprintln!("source: usage: source <path>");
            return BuiltinOutput::fail(1);
        }
    };
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("source: {}: {}", path, e);
            return BuiltinOutput::fail(1);
        }
    };

    let mut output = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let pipeline = match crate::parser::parse(trimmed) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("source: {}: {}", path, e);
                return BuiltinOutput { status: 2, output };
            }
        };
        let outcome = crate::executor::run(state, &pipeline, trimmed);
        output.extend_from_slice(&outcome.output);
        state.exit_code = outcome.status;
        if outcome.status != 0 {
            // stop at the first failing line
            return BuiltinOutput {
                status: outcome.status,
                output,
            };
        }
        if state.should_exit {
            break;
        }
    }
    BuiltinOutput { status: 0, output }
}

fn help(_state: &mut ShellState, _argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    BuiltinOutput::ok(
        "\
gshell builtins:
  cd [DIR]           change directory (default $HOME)
  pwd                print the working directory
  echo [-n] ARGS     print arguments
  export [NAME[=V]]  set or list environment variables
  unset NAME...      remove environment variables
  alias [NAME[=V]]   set or list aliases
  unalias NAME|-a    remove aliases
  jobs               list background jobs
  fg [%N] / bg [%N]  continue a job in the fore/background
  history [N]        show recent commands
  source PATH        run commands from a file
  net-test HOST PORT / net-resolve HOST / net-fetch URL / net-scan HOST [A-B]
  exit [N]           leave the shell
",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lookup_knows_the_fixed_set() {
        for name in [
            "cd", "pwd", "echo", "export", "unset", "alias", "unalias", "exit", "jobs", "fg",
            "bg", "history", "source", "help",
        ] {
            assert!(lookup(name).is_some(), "missing builtin {}", name);
        }
        assert!(lookup("ls").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn echo_joins_and_terminates() {
        let mut state = ShellState::default();
        let out = echo(&mut state, &args(&["echo", "hello", "world"]), &[]);
        assert_eq!(out.status, 0);
        assert_eq!(out.output, b"hello world\n");
    }

    #[test]
    fn echo_n_suppresses_newline() {
        let mut state = ShellState::default();
        let out = echo(&mut state, &args(&["echo", "-n", "x"]), &[]);
        assert_eq!(out.output, b"x");
    }

    #[test]
    fn export_sets_and_rejects() {
        let mut state = ShellState::default();
        let out = export(&mut state, &args(&["export", "A=1"]), &[]);
        assert_eq!(out.status, 0);
        assert_eq!(state.get_var("A"), Some("1"));

        let out = export(&mut state, &args(&["export", "bad name=1"]), &[]);
        assert_eq!(out.status, 1);
    }

    #[test]
    fn export_bare_name_keeps_value() {
        let mut state = ShellState::default();
        state.set_var("KEEP", "v").unwrap();
        let out = export(&mut state, &args(&["export", "KEEP"]), &[]);
        assert_eq!(out.status, 0);
        assert_eq!(state.get_var("KEEP"), Some("v"));
    }

    #[test]
    fn exit_sets_flags() {
        let mut state = ShellState::default();
        let out = exit(&mut state, &args(&["exit", "3"]), &[]);
        assert!(state.should_exit);
        assert_eq!(state.exit_code, 3);
        assert_eq!(out.status, 3);
    }

    #[test]
    fn exit_defaults_to_last_status() {
        let mut state = ShellState::default();
        state.exit_code = 7;
        exit(&mut state, &args(&["exit"]), &[]);
        assert_eq!(state.exit_code, 7);
    }

    #[test]
    fn alias_set_list_and_remove() {
        let mut state = ShellState::default();
        alias(&mut state, &args(&["alias", "ll=ls -la"]), &[]);
        let listing = alias(&mut state, &args(&["alias"]), &[]);
        assert!(String::from_utf8(listing.output)
            .unwrap()
            .contains("alias ll='ls -la'"));
        let out = unalias(&mut state, &args(&["unalias", "ll"]), &[]);
        assert_eq!(out.status, 0);
        assert_eq!(state.get_alias("ll"), None);
    }

    #[test]
    fn jobs_lists_and_acknowledges_done() {
        let mut state = ShellState::default();
        state.add_job(424242, "sleep 100".into());
        state.mark_job_done(424242);
        let out = jobs(&mut state, &args(&["jobs"]), &[]);
        assert!(String::from_utf8(out.output).unwrap().contains("done"));
        assert!(state.jobs().is_empty());
    }

    #[test]
    fn cd_failure_leaves_state_alone() {
        let mut state = ShellState::default();
        let before = env::current_dir().unwrap();
        let out = cd(
            &mut state,
            &args(&["cd", "/definitely/not/a/dir/here"]),
            &[],
        );
        assert_eq!(out.status, 1);
        assert_eq!(env::current_dir().unwrap(), before);
    }
}
