//! The host API exposed to configuration scripts
//!
//! Every function is a closure over an explicit [`ScriptCtx`]; there is no
//! global engine or state pointer. Failure is a return value (`()` or
//! `false`), never an exception into host code, so a broken rc file cannot
//! take the shell down. All returned strings are copies owned by the
//! engine.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine};

use crate::executor;
use crate::state::ShellState;

/// Per-invocation context shared by the host closures.
#[derive(Clone)]
pub struct ScriptCtx {
    pub state: Rc<RefCell<ShellState>>,
    pub loaded: Rc<RefCell<HashSet<String>>>,
    pub plugin_dirs: Rc<Vec<PathBuf>>,
}

/// Reject obviously malformed paths before any filesystem call.
fn valid_path(path: &str) -> bool {
    !path.is_empty() && !path.contains('\0')
}

/// Run one line through the full parse + execute path, printing whatever
/// the pipeline captured. True on status 0.
fn exec_line(state: &Rc<RefCell<ShellState>>, line: &str) -> bool {
    match crate::parser::parse(line) {
        Ok(Some(pipeline)) => {
            let outcome = {
                let mut state = state.borrow_mut();
                let outcome = executor::run(&mut state, &pipeline, line);
                state.exit_code = outcome.status;
                outcome
            };
            if !outcome.output.is_empty() {
                use std::io::Write;
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(&outcome.output);
                if outcome.output.last() != Some(&b'\n') {
                    let _ = stdout.write_all(b"\n");
                }
                let _ = stdout.flush();
            }
            outcome.status == 0
        }
        Ok(None) => true,
        Err(_) => false,
    }
}

fn git_output(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

/// Locate and run `plugin.rhai` for `name`; remembers successful loads.
pub(crate) fn enable_plugin_impl(ctx: &ScriptCtx, name: &str, path: Option<&str>) -> bool {
    if name.is_empty() || ctx.loaded.borrow().contains(name) {
        return !name.is_empty();
    }
    let file = match path {
        Some(p) if valid_path(p) => PathBuf::from(p),
        Some(_) => return false,
        None => {
            let found = ctx
                .plugin_dirs
                .iter()
                .map(|dir| dir.join(name).join("plugin.rhai"))
                .find(|candidate| candidate.is_file());
            match found {
                Some(file) => file,
                None => {
                    eprintln!("gshell: plugin {}: not found", name);
                    return false;
                }
            }
        }
    };
    match super::run_file(ctx, &file) {
        Ok(()) => {
            ctx.loaded.borrow_mut().insert(name.to_string());
            true
        }
        Err(e) => {
            // a broken plugin stays isolated to itself
            eprintln!("gshell: plugin {}: {}", name, e);
            false
        }
    }
}

/// Bind the whole host surface onto `engine`.
pub fn register_host_api(engine: &mut Engine, ctx: &ScriptCtx) {
    // --- environment & aliases ---
    let c = ctx.clone();
    engine.register_fn("getenv", move |name: &str| -> String {
        c.state.borrow().get_var(name).unwrap_or_default().to_string()
    });
    let c = ctx.clone();
    engine.register_fn("setenv", move |name: &str, value: &str| -> bool {
        c.state.borrow_mut().set_var(name, value).is_ok()
    });
    let c = ctx.clone();
    engine.register_fn("alias", move |name: &str, cmd: &str| -> bool {
        c.state.borrow_mut().set_alias(name, cmd).is_ok()
    });
    let c = ctx.clone();
    engine.register_fn("unalias", move |name: &str| -> bool {
        c.state.borrow_mut().remove_alias(name)
    });

    // --- command execution ---
    let c = ctx.clone();
    engine.register_fn("exec", move |line: &str| -> bool { exec_line(&c.state, line) });

    // --- working directory & identity ---
    engine.register_fn("cd", |path: &str| -> bool {
        valid_path(path) && std::env::set_current_dir(path).is_ok()
    });
    engine.register_fn("get_cwd", || -> String {
        std::env::current_dir()
            .map(|d| d.display().to_string())
            .unwrap_or_default()
    });
    let c = ctx.clone();
    engine.register_fn("get_user", move || -> String {
        c.state
            .borrow()
            .get_var("USER")
            .map(String::from)
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_default())
    });
    engine.register_fn("get_hostname", || -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    // --- filesystem ---
    engine.register_fn("path_exists", |path: &str| -> bool {
        valid_path(path) && Path::new(path).exists()
    });
    engine.register_fn("is_file", |path: &str| -> bool {
        valid_path(path) && Path::new(path).is_file()
    });
    engine.register_fn("is_dir", |path: &str| -> bool {
        valid_path(path) && Path::new(path).is_dir()
    });
    engine.register_fn("read_file", |path: &str| -> Dynamic {
        if !valid_path(path) {
            return Dynamic::UNIT;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => content.into(),
            Err(_) => Dynamic::UNIT,
        }
    });
    engine.register_fn("write_file", |path: &str, content: &str| -> bool {
        valid_path(path)
            && !executor::is_unsafe_write_path(path)
            && std::fs::write(path, content).is_ok()
    });
    engine.register_fn("list_files", |dir: &str| -> Array { list_entries(dir, None, false) });
    engine.register_fn("list_files", |dir: &str, pattern: &str| -> Array {
        list_entries(dir, Some(pattern), false)
    });
    engine.register_fn("list_dirs", |dir: &str| -> Array { list_entries(dir, None, true) });
    engine.register_fn("list_dirs", |dir: &str, pattern: &str| -> Array {
        list_entries(dir, Some(pattern), true)
    });

    // --- PATH lookup ---
    let c = ctx.clone();
    engine.register_fn("command_exists", move |name: &str| -> bool {
        if name.is_empty() {
            return false;
        }
        if crate::builtins::lookup(name).is_some() {
            return true;
        }
        let state = c.state.borrow();
        let path = state
            .get_var("PATH")
            .map(String::from)
            .unwrap_or_else(|| std::env::var("PATH").unwrap_or_default());
        path.split(':').any(|dir| is_executable(&Path::new(dir).join(name)))
    });

    // --- history reconfiguration (before the REPL begins) ---
    let c = ctx.clone();
    engine.register_fn("set_history_size", move |n: i64| -> bool {
        if n <= 0 {
            return false;
        }
        c.state.borrow_mut().history_size = n as usize;
        true
    });
    let c = ctx.clone();
    engine.register_fn("set_history_file", move |path: &str| -> bool {
        if !valid_path(path) {
            return false;
        }
        c.state.borrow_mut().history_file = Some(PathBuf::from(path));
        true
    });

    // --- plugins ---
    let c = ctx.clone();
    engine.register_fn("enable_plugin", move |name: &str| -> bool {
        enable_plugin_impl(&c, name, None)
    });
    let c = ctx.clone();
    engine.register_fn("enable_plugin", move |name: &str, path: &str| -> bool {
        enable_plugin_impl(&c, name, Some(path))
    });
    let c = ctx.clone();
    engine.register_fn("disable_plugin", move |name: &str| -> bool {
        c.loaded.borrow_mut().remove(name)
    });
    let c = ctx.clone();
    engine.register_fn("plugin_loaded", move |name: &str| -> bool {
        c.loaded.borrow().contains(name)
    });

    // --- git helpers, nil/false on any failure ---
    engine.register_fn("git_branch", || -> Dynamic {
        match git_output(&["rev-parse", "--abbrev-ref", "HEAD"]) {
            Some(branch) if !branch.is_empty() => branch.into(),
            _ => Dynamic::UNIT,
        }
    });
    engine.register_fn("git_dirty", || -> bool {
        git_output(&["status", "--porcelain"])
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    });
    engine.register_fn("in_git_repo", || -> bool {
        git_output(&["rev-parse", "--is-inside-work-tree"]).as_deref() == Some("true")
    });
    engine.register_fn("git_ahead_behind", || -> Dynamic {
        let counts = git_output(&["rev-list", "--left-right", "--count", "HEAD...@{upstream}"]);
        match counts.as_deref().and_then(parse_ahead_behind) {
            Some((ahead, behind)) => {
                let mut arr = Array::new();
                arr.push(Dynamic::from(ahead));
                arr.push(Dynamic::from(behind));
                arr.into()
            }
            None => Dynamic::UNIT,
        }
    });
}

fn parse_ahead_behind(counts: &str) -> Option<(i64, i64)> {
    let mut fields = counts.split_whitespace();
    let ahead = fields.next()?.parse().ok()?;
    let behind = fields.next()?.parse().ok()?;
    Some((ahead, behind))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Directory listing with an optional glob filter over entry names.
fn list_entries(dir: &str, pattern: Option<&str>, dirs_only: bool) -> Array {
    if !valid_path(dir) {
        return Array::new();
    }
    let matcher = match pattern {
        Some(p) => match glob::Pattern::new(p) {
            Ok(matcher) => Some(matcher),
            Err(_) => return Array::new(),
        },
        None => None,
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Array::new(),
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let is_dir = e.path().is_dir();
            if dirs_only {
                is_dir
            } else {
                !is_dir
            }
        })
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .filter(|name| matcher.as_ref().map_or(true, |m| m.matches(name)))
        .collect();
    names.sort();
    names.into_iter().map(Dynamic::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ahead_behind_parses_git_count_output() {
        assert_eq!(parse_ahead_behind("2\t5"), Some((2, 5)));
        assert_eq!(parse_ahead_behind("0 0"), Some((0, 0)));
        assert_eq!(parse_ahead_behind("nope"), None);
    }

    #[test]
    fn path_validation() {
        assert!(valid_path("/tmp/x"));
        assert!(!valid_path(""));
        assert!(!valid_path("bad\0path"));
    }

    #[test]
    fn listing_filters_with_globs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let base = dir.path().to_str().unwrap();
        let files = list_entries(base, None, false);
        assert_eq!(files.len(), 2);
        let rust_only = list_entries(base, Some("*.rs"), false);
        assert_eq!(rust_only.len(), 1);
        let dirs = list_entries(base, None, true);
        assert_eq!(dirs.len(), 1);
    }
}
