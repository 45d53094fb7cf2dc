//! Embedded configuration scripting
//!
//! The rc file and plugins are rhai scripts executed inside a sandboxed
//! engine: bounded operation count, a wall-clock deadline checked from the
//! engine's progress hook, capped string/collection sizes, and no module
//! imports. Scripts talk to the shell exclusively through the host API
//! registered in [`api`]; host functions signal failure by returning
//! `()`/`false` and never raise into the engine.

pub mod api;

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use rhai::{Dynamic, Engine, EvalAltResult};
use thiserror::Error;

use crate::state::ShellState;
use api::ScriptCtx;

/// File extension that routes a script to this host.
pub const SCRIPT_EXT: &str = "rhai";

/// Wall-clock budget per script invocation.
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);
/// Engine operation budget per invocation.
const MAX_OPERATIONS: u64 = 10_000_000;
/// Data-size caps standing in for the ~50 MiB memory ceiling.
const MAX_STRING_BYTES: usize = 16 * 1024 * 1024;
const MAX_ARRAY_ITEMS: usize = 1_000_000;
const MAX_MAP_ITEMS: usize = 100_000;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("script engine init failed: {0}")]
    EngineInit(String),
    #[error("cannot load {0}: {1}")]
    Load(String, #[source] std::io::Error),
    #[error("{0}")]
    Execution(String),
    #[error("script exceeded the {}s execution budget", SCRIPT_TIMEOUT.as_secs())]
    Timeout,
    #[error("script exceeded a memory limit")]
    MemoryLimit,
}

/// Build an engine with the sandbox limits and the host API bound to
/// `ctx`. The deadline starts now: one engine per invocation.
fn sandboxed_engine(ctx: &ScriptCtx) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_string_size(MAX_STRING_BYTES);
    engine.set_max_array_size(MAX_ARRAY_ITEMS);
    engine.set_max_map_size(MAX_MAP_ITEMS);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 32);
    engine.set_max_modules(0);

    let deadline = Instant::now() + SCRIPT_TIMEOUT;
    engine.on_progress(move |_| {
        if Instant::now() > deadline {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });

    api::register_host_api(&mut engine, ctx);
    engine
}

fn map_engine_error(err: Box<EvalAltResult>) -> ScriptError {
    match *err {
        EvalAltResult::ErrorTerminated(..) => ScriptError::Timeout,
        EvalAltResult::ErrorDataTooLarge(..) => ScriptError::MemoryLimit,
        other => ScriptError::Execution(other.to_string()),
    }
}

/// Run one script file against `ctx` in a fresh sandboxed engine.
pub(crate) fn run_file(ctx: &ScriptCtx, path: &Path) -> Result<(), ScriptError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| ScriptError::Load(path.display().to_string(), e))?;
    let engine = sandboxed_engine(ctx);
    engine.run(&source).map_err(map_engine_error)
}

/// The script host owns the plugin search roots and the loaded-plugin set
/// for the life of the shell. Each invocation gets a fresh engine and a
/// context that borrows the active `ShellState` only for that call.
pub struct ScriptHost {
    plugin_dirs: Vec<PathBuf>,
    loaded: Rc<RefCell<HashSet<String>>>,
}

impl ScriptHost {
    pub fn new() -> Self {
        let mut plugin_dirs = Vec::new();
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            let base = home.join(".config").join("gshell");
            plugin_dirs.push(base.join("assets").join("plugins"));
            plugin_dirs.push(base.join("user").join("plugins"));
        }
        ScriptHost {
            plugin_dirs,
            loaded: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    fn ctx(&self, state: &Rc<RefCell<ShellState>>) -> ScriptCtx {
        ScriptCtx {
            state: Rc::clone(state),
            loaded: Rc::clone(&self.loaded),
            plugin_dirs: Rc::new(self.plugin_dirs.clone()),
        }
    }

    /// Execute the rc file once.
    pub fn run_rc(&self, path: &Path, state: &Rc<RefCell<ShellState>>) -> Result<(), ScriptError> {
        run_file(&self.ctx(state), path)
    }

    /// Execute a script invoked from the CLI, with `$0..$N` already bound
    /// by the caller. The script's verdict is the state's exit code, or 1
    /// when the engine reports an error.
    pub fn run_script(
        &self,
        path: &Path,
        state: &Rc<RefCell<ShellState>>,
    ) -> Result<i32, ScriptError> {
        run_file(&self.ctx(state), path)?;
        Ok(state.borrow().exit_code)
    }

    /// Load a plugin by name through the same path `enable_plugin` uses.
    pub fn load_plugin(&self, name: &str, state: &Rc<RefCell<ShellState>>) -> bool {
        api::enable_plugin_impl(&self.ctx(state), name, None)
    }

    pub fn plugin_loaded(&self, name: &str) -> bool {
        self.loaded.borrow().contains(name)
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}
