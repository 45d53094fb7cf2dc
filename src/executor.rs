//! Pipeline execution
//!
//! Stages run strictly left to right with fully materialized buffers: a
//! stage's stdin is written in full before its stdout is drained, and the
//! drained output becomes the next stage's stdin. Builtins short-circuit
//! the fork/exec path. Redirection targets under system directories are
//! refused outright.
//!
//! Side effects of earlier stages (env writes, files, cwd) are kept even
//! when a later stage fails; only the reported status changes.

use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command as ProcCommand, Stdio};

use thiserror::Error;

use crate::builtins;
use crate::expand::{apply_alias, expand_arg, expand_argv};
use crate::parser::{Pipeline, RedirectMode};
use crate::state::ShellState;

/// Largest file `<` will slurp into memory.
const MAX_REDIRECT_INPUT: u64 = 100 * 1024 * 1024;

/// Write redirections rooted in these directories are refused.
const UNSAFE_WRITE_PREFIXES: &[&str] = &[
    "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc",
];

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("{0}: file too large for redirection ({1} bytes)")]
    FileTooLarge(String, u64),
    #[error("{0}: refusing to write into a system directory")]
    UnsafeOperation(String),
    #[error("{0}: {1}")]
    Io(String, io::Error),
}

/// What running a pipeline produced.
#[derive(Debug, Default)]
pub struct ExecOutcome {
    pub status: i32,
    pub output: Vec<u8>,
    pub job_id: Option<u32>,
}

/// Run a pipeline to completion. `command_text` is the original line, kept
/// for the job table. Never returns an error: failures become statuses and
/// stderr diagnostics, and the REPL carries on.
pub fn run(state: &mut ShellState, pipeline: &Pipeline, command_text: &str) -> ExecOutcome {
    if pipeline.background {
        return run_background(state, pipeline, command_text);
    }

    let mut previous_output: Vec<u8> = Vec::new();
    let mut status = 0;

    for command in &pipeline.commands {
        let mut argv = expand_argv(command, state);
        if argv.is_empty() {
            // stage elided by expansion; carry input through
            continue;
        }
        apply_alias(&mut argv, state);
        if argv.is_empty() {
            continue;
        }

        // Stage stdin: explicit redirection beats the previous stage.
        // Redirect targets expand like any other argument.
        let stdin_data = match &command.stdin_file {
            Some(path) => match read_input_file(&expand_arg(path, state)) {
                Ok(data) => data,
                Err(e) => {
                    eprintln!("gshell: {}", e);
                    status = 1;
                    previous_output = Vec::new();
                    continue;
                }
            },
            None => std::mem::take(&mut previous_output),
        };

        let (stage_status, stage_output) = match builtins::lookup(&argv[0]) {
            Some(builtin) => {
                let out = builtin(state, &argv, &stdin_data);
                (out.status, out.output)
            }
            None => run_external(state, &argv, &stdin_data),
        };
        status = stage_status;

        match &command.stdout_file {
            Some((path, mode)) => {
                if let Err(e) = write_output_file(&expand_arg(path, state), *mode, &stage_output) {
                    eprintln!("gshell: {}", e);
                    status = 1;
                }
                previous_output = Vec::new();
            }
            None => previous_output = stage_output,
        }

        if state.should_exit {
            break;
        }
    }

    ExecOutcome {
        status,
        output: previous_output,
        job_id: None,
    }
}

/// Launch the pipeline's single command detached, with the null device on
/// both ends, and register it in the job table.
fn run_background(state: &mut ShellState, pipeline: &Pipeline, command_text: &str) -> ExecOutcome {
    let command = &pipeline.commands[0];
    let mut argv = expand_argv(command, state);
    apply_alias(&mut argv, state);
    if argv.is_empty() {
        return ExecOutcome::default();
    }

    if let Some(builtin) = builtins::lookup(&argv[0]) {
        // builtins have nothing to detach; run them in place
        let out = builtin(state, &argv, &[]);
        return ExecOutcome {
            status: out.status,
            output: out.output,
            job_id: None,
        };
    }

    let mut cmd = ProcCommand::new(&argv[0]);
    cmd.args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .env_clear()
        .envs(state.env());
    restore_child_signals(&mut cmd);

    match cmd.spawn() {
        Ok(child) => {
            let id = state.add_job(child.id() as i32, command_text.to_string());
            ExecOutcome {
                status: 0,
                output: Vec::new(),
                job_id: Some(id),
            }
        }
        Err(e) => {
            let status = spawn_failure_status(&argv[0], &e);
            ExecOutcome {
                status,
                output: Vec::new(),
                job_id: None,
            }
        }
    }
}

/// Fork/exec one stage: feed it `stdin_data`, drain its stdout, inherit
/// stderr, wait. Returns `(status, captured_stdout)`.
fn run_external(state: &ShellState, argv: &[String], stdin_data: &[u8]) -> (i32, Vec<u8>) {
    let mut cmd = ProcCommand::new(&argv[0]);
    cmd.args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .env_clear()
        .envs(state.env());
    restore_child_signals(&mut cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return (spawn_failure_status(&argv[0], &e), Vec::new()),
    };

    // Fully write the stage's stdin before reading its stdout. A child
    // that exits early turns this into EPIPE, which is not our failure.
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(stdin_data);
    }

    match child.wait_with_output() {
        Ok(output) => {
            let status = output
                .status
                .code()
                .or_else(|| output.status.signal().map(|s| 128 + s))
                .unwrap_or(1);
            (status, output.stdout)
        }
        Err(e) => {
            eprintln!("gshell: {}: {}", argv[0], e);
            (1, Vec::new())
        }
    }
}

/// Reset the dispositions the shell overrides, so children start with
/// defaults.
fn restore_child_signals(cmd: &mut ProcCommand) {
    unsafe {
        cmd.pre_exec(|| {
            libc::signal(libc::SIGINT, libc::SIG_DFL);
            libc::signal(libc::SIGQUIT, libc::SIG_DFL);
            libc::signal(libc::SIGTSTP, libc::SIG_DFL);
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            Ok(())
        });
    }
}

fn spawn_failure_status(name: &str, err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::NotFound => {
            eprintln!("gshell: {}: command not found", name);
            127
        }
        io::ErrorKind::PermissionDenied => {
            eprintln!("gshell: {}: permission denied", name);
            126
        }
        _ => {
            eprintln!("gshell: {}: {}", name, err);
            127
        }
    }
}

/// Slurp a `<` target, size-capped.
fn read_input_file(path: &str) -> Result<Vec<u8>, ExecError> {
    let metadata =
        std::fs::metadata(path).map_err(|e| ExecError::Io(path.to_string(), e))?;
    if metadata.len() > MAX_REDIRECT_INPUT {
        return Err(ExecError::FileTooLarge(path.to_string(), metadata.len()));
    }
    let mut data = Vec::with_capacity(metadata.len() as usize);
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut data))
        .map_err(|e| ExecError::Io(path.to_string(), e))?;
    Ok(data)
}

/// Resolve to an absolute path without touching the filesystem.
fn absolutize(path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(p))
            .unwrap_or_else(|_| p.to_path_buf())
    }
}

pub(crate) fn is_unsafe_write_path(path: &str) -> bool {
    let absolute = absolutize(path);
    UNSAFE_WRITE_PREFIXES
        .iter()
        .any(|prefix| absolute.starts_with(prefix))
}

/// Write a stage's output through a `>` or `>>` redirection. New files are
/// created owner-only.
fn write_output_file(path: &str, mode: RedirectMode, data: &[u8]) -> Result<(), ExecError> {
    if is_unsafe_write_path(path) {
        return Err(ExecError::UnsafeOperation(path.to_string()));
    }
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o600);
    match mode {
        RedirectMode::Truncate => options.truncate(true),
        RedirectMode::Append => options.append(true),
    };
    let mut file = options
        .open(path)
        .map_err(|e| ExecError::Io(path.to_string(), e))?;
    file.write_all(data)
        .map_err(|e| ExecError::Io(path.to_string(), e))?;
    Ok(())
}
