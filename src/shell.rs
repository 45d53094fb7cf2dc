//! The Shell - central coordinator
//!
//! Owns the state, the history mirror, and the pluggable collaborators
//! (prompt renderer, highlighter, completion provider), and drives one
//! REPL iteration: drain signals, render the prompt, read a line, parse,
//! execute, persist history, print. Script and single-command modes reuse
//! the same parse + execute path.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use crate::complete::PathCompleter;
use crate::config::ShellConfig;
use crate::editor::{EditorError, Highlighter, LineEditor, PlainHighlighter};
use crate::executor::{self, ExecOutcome};
use crate::history::{HistoryError, HistoryStore};
use crate::parser::{self, ParseError};
use crate::prompt::{render_or_fallback, PromptContext, PromptRenderer, TemplatePrompt};
use crate::rcfile;
use crate::script::{ScriptError, ScriptHost};
use crate::signals;
use crate::state::ShellState;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    #[error("script error: {0}")]
    Script(#[from] ScriptError),
    #[error("editor error: {0}")]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct Shell {
    config: ShellConfig,
    state: Rc<RefCell<ShellState>>,
    script_host: ScriptHost,
    history: Option<HistoryStore>,
    /// In-memory mirror of recent commands for up-arrow recall.
    ring: Vec<String>,
    renderer: Box<dyn PromptRenderer>,
    highlighter: Box<dyn Highlighter>,
    completer: PathCompleter,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        let mut state = ShellState::new();
        state.history_file = config.history_file.clone();
        state.history_size = config.history_size;
        let renderer = Box::new(TemplatePrompt::new(&config.prompt));
        Shell {
            renderer,
            state: Rc::new(RefCell::new(state)),
            script_host: ScriptHost::new(),
            history: None,
            ring: Vec::new(),
            highlighter: Box::new(PlainHighlighter),
            completer: PathCompleter,
            config,
        }
    }

    /// Swap in an external prompt renderer.
    pub fn set_prompt_renderer(&mut self, renderer: Box<dyn PromptRenderer>) {
        self.renderer = renderer;
    }

    /// Swap in an external syntax highlighter.
    pub fn set_highlighter(&mut self, highlighter: Box<dyn Highlighter>) {
        self.highlighter = highlighter;
    }

    /// Accessor for builtin tests and embedding callers.
    pub fn state(&self) -> Rc<RefCell<ShellState>> {
        Rc::clone(&self.state)
    }

    // --- one-shot and script modes ---

    /// `gshell -c <command>`: parse and execute exactly once.
    pub fn run_command(&mut self, line: &str) -> i32 {
        let outcome = self.execute_line(line);
        self.print_outcome(&outcome);
        outcome.status
    }

    /// `gshell <script> [args...]`: rhai scripts go to the script host,
    /// anything else runs line by line, stopping only on `exit`.
    pub fn run_script(&mut self, path: &str, args: &[String]) -> i32 {
        {
            let mut state = self.state.borrow_mut();
            let _ = state.set_var("0", path);
            for (i, arg) in args.iter().enumerate() {
                let _ = state.set_var(&(i + 1).to_string(), arg);
            }
        }

        if rcfile::is_scripted(Path::new(path)) {
            return match self.script_host.run_script(Path::new(path), &self.state) {
                Ok(status) => status,
                Err(e) => {
                    eprintln!("gshell: {}: {}", path, e);
                    1
                }
            };
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("gshell: {}: {}", path, e);
                return 1;
            }
        };
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let outcome = self.execute_line(trimmed);
            self.print_outcome(&outcome);
            if self.state.borrow().should_exit {
                break;
            }
        }
        self.state.borrow().exit_code
    }

    // --- interactive mode ---

    /// The REPL. Returns the shell's final exit code.
    pub fn run_interactive(&mut self) -> i32 {
        signals::install();
        self.startup();
        if let Err(e) = self.open_history() {
            eprintln!("gshell: {}", e);
        }
        let interactive_tty = nix::unistd::isatty(libc::STDIN_FILENO).unwrap_or(false);

        loop {
            // loop-boundary signal drain
            signals::take_sigint();
            if signals::take_sigchld() {
                let mut state = self.state.borrow_mut();
                signals::reap_children(&mut state);
                signals::report_done_jobs(&mut state, &mut io::stdout());
            }
            if signals::take_sigtstp() {
                eprintln!("gshell: job control is not available");
            }

            let prompt = {
                let state = self.state.borrow();
                let ctx = PromptContext::gather(&state);
                render_or_fallback(self.renderer.as_ref(), &ctx, &self.config.prompt)
            };

            let line = if interactive_tty {
                let mut editor = LineEditor::new(
                    &self.ring,
                    &self.completer,
                    self.highlighter.as_ref(),
                );
                match editor.read_line(&prompt) {
                    Ok(line) => line,
                    Err(EditorError::OperationAborted) => continue,
                    Err(EditorError::LineTooLong) => {
                        eprintln!("gshell: input line too long");
                        continue;
                    }
                    Err(EditorError::Io(e)) => {
                        eprintln!("gshell: {}", e);
                        break;
                    }
                }
            } else {
                match read_plain_line() {
                    Ok(line) => line,
                    Err(e) => {
                        eprintln!("gshell: {}", e);
                        break;
                    }
                }
            };

            let Some(line) = line else {
                break; // EOF
            };
            let line = line.trim().to_string();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            self.remember(&line);
            let outcome = self.execute_line(&line);
            if let Some(store) = &self.history {
                if let Err(e) = store.append(&line, outcome.status) {
                    eprintln!("gshell: {}", e);
                }
            }
            self.print_outcome(&outcome);

            if self.state.borrow().should_exit {
                break;
            }
        }

        if let Some(store) = &self.history {
            let _ = store.flush();
        }
        self.state.borrow().exit_code
    }

    /// Run the rc file (if any), then the configured plugins.
    fn startup(&mut self) {
        if let Some(rc) = rcfile::find_rc(&self.config) {
            if rcfile::is_scripted(&rc) {
                if let Err(e) = self.script_host.run_rc(&rc, &self.state) {
                    eprintln!("gshell: {}: {}", rc.display(), e);
                }
            } else if let Ok(content) = std::fs::read_to_string(&rc) {
                for (line_num, line) in content.lines().enumerate() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    let outcome = self.execute_line(trimmed);
                    if outcome.status != 0 {
                        eprintln!(
                            "gshell: {} line {}: status {}",
                            rc.display(),
                            line_num + 1,
                            outcome.status
                        );
                    }
                }
            }
        }
        let plugins = self.config.plugins.clone();
        for name in &plugins {
            self.script_host.load_plugin(name, &self.state);
        }
    }

    /// Open the history store after the rc file had its chance to move or
    /// resize it, and seed the up-arrow mirror.
    fn open_history(&mut self) -> Result<(), ShellError> {
        let (path, size) = {
            let state = self.state.borrow();
            (state.history_file.clone(), state.history_size)
        };
        if let Some(path) = path {
            let store = HistoryStore::open(&path, self.config.warn_loose_history_perms)?;
            self.ring = store
                .recent(size)?
                .into_iter()
                .map(|entry| entry.command)
                .collect();
            self.history = Some(store);
        }
        Ok(())
    }

    /// Push into the in-memory mirror, deduplicating against the exact
    /// previous entry only.
    fn remember(&mut self, line: &str) {
        if self.ring.last().map(|s| s.as_str()) == Some(line) {
            return;
        }
        self.ring.push(line.to_string());
        let cap = self.state.borrow().history_size;
        if self.ring.len() > cap {
            self.ring.drain(..self.ring.len() - cap);
        }
    }

    /// Parse and execute one line; parse failures cost status 2 and never
    /// reach the executor.
    fn execute_line(&mut self, line: &str) -> ExecOutcome {
        match parser::parse(line) {
            Ok(Some(pipeline)) => {
                let outcome = {
                    let mut state = self.state.borrow_mut();
                    let outcome = executor::run(&mut state, &pipeline, line);
                    state.exit_code = outcome.status;
                    outcome
                };
                if let Some(id) = outcome.job_id {
                    println!("[{}] started", id);
                }
                outcome
            }
            Ok(None) => ExecOutcome::default(),
            Err(e) => {
                eprintln!("gshell: {}", e);
                self.state.borrow_mut().exit_code = 2;
                ExecOutcome {
                    status: 2,
                    output: Vec::new(),
                    job_id: None,
                }
            }
        }
    }

    /// Print captured output; guarantee it ends in a newline.
    fn print_outcome(&self, outcome: &ExecOutcome) {
        if outcome.output.is_empty() {
            return;
        }
        let mut stdout = io::stdout();
        let _ = stdout.write_all(&outcome.output);
        if outcome.output.last() != Some(&b'\n') {
            let _ = stdout.write_all(b"\n");
        }
        let _ = stdout.flush();
    }
}

/// Line-at-a-time fallback when stdin is not a terminal.
fn read_plain_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_shell() -> Shell {
        let config = ShellConfig {
            history_file: None,
            rc_file: Some(std::path::PathBuf::from("/definitely/missing/rc")),
            ..ShellConfig::default()
        };
        Shell::new(config)
    }

    #[test]
    fn run_command_returns_status() {
        let mut shell = test_shell();
        assert_eq!(shell.run_command("echo ok"), 0);
        assert_eq!(shell.run_command("definitely-not-a-command-xyz"), 127);
    }

    #[test]
    fn parse_errors_are_status_2_and_recoverable() {
        let mut shell = test_shell();
        assert_eq!(shell.run_command("echo 'unterminated"), 2);
        // the shell keeps going
        assert_eq!(shell.run_command("echo fine"), 0);
    }

    #[test]
    fn state_flows_between_commands() {
        let mut shell = test_shell();
        shell.run_command("export GREET=hello");
        let outcome = shell.execute_line("echo $GREET");
        assert_eq!(outcome.output, b"hello\n");
    }

    #[test]
    fn remember_dedups_only_adjacent() {
        let mut shell = test_shell();
        shell.remember("a");
        shell.remember("a");
        shell.remember("b");
        shell.remember("a");
        assert_eq!(shell.ring, vec!["a", "b", "a"]);
    }

    #[test]
    fn script_mode_sets_positional_args() {
        let mut shell = test_shell();
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("s.gsh");
        let out = dir.path().join("out.txt");
        std::fs::write(
            &script,
            format!("# demo\necho $1 $2 > {}\n", out.display()),
        )
        .unwrap();

        let status = shell.run_script(
            script.to_str().unwrap(),
            &["one".to_string(), "two".to_string()],
        );
        assert_eq!(status, 0);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "one two\n");
    }

    #[test]
    fn script_mode_continues_after_failures() {
        let mut shell = test_shell();
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("s.gsh");
        let out = dir.path().join("out.txt");
        std::fs::write(
            &script,
            format!("definitely-not-a-command-xyz\necho after > {}\n", out.display()),
        )
        .unwrap();

        shell.run_script(script.to_str().unwrap(), &[]);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "after\n");
    }

    #[test]
    fn script_mode_stops_on_exit() {
        let mut shell = test_shell();
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("s.gsh");
        let out = dir.path().join("out.txt");
        std::fs::write(
            &script,
            format!("exit 7\necho never > {}\n", out.display()),
        )
        .unwrap();

        let status = shell.run_script(script.to_str().unwrap(), &[]);
        assert_eq!(status, 7);
        assert!(!out.exists());
    }
}
