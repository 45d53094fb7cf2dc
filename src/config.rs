//! Shell configuration
//!
//! `ShellConfig` is immutable once the shell starts; the external loader
//! (flags, environment, config file) produces one and hands it to
//! [`crate::Shell::new`]. The script host may adjust history settings via
//! its dedicated hooks before the REPL begins.

use std::env;
use std::path::PathBuf;

/// Default bound on the in-memory history ring and `history` listing.
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Immutable shell configuration.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Prompt template; `{user}`, `{host}`, `{cwd}`, `{status}` and `{jobs}`
    /// are expanded by the default renderer. Also the fallback text when a
    /// custom renderer fails.
    pub prompt: String,
    /// Whether to run the interactive REPL (false for `-c` and script mode).
    pub interactive: bool,
    /// History file path; `None` disables persistent history.
    pub history_file: Option<PathBuf>,
    /// Bound on the in-memory history ring.
    pub history_size: usize,
    /// rc file path override; `None` means discover under `$HOME`.
    pub rc_file: Option<PathBuf>,
    /// Plugin names to load after the rc file runs.
    pub plugins: Vec<String>,
    /// Warn (rather than silently fix) when the history file has loose
    /// permissions.
    pub warn_loose_history_perms: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            prompt: "{user}@{host} {cwd} $ ".to_string(),
            interactive: true,
            history_file: None,
            history_size: DEFAULT_HISTORY_SIZE,
            rc_file: None,
            plugins: Vec::new(),
            warn_loose_history_perms: true,
        }
    }
}

impl ShellConfig {
    /// Build a config from process environment conventions: history under
    /// `$HOME/.gshell_history`, rc override from `$GSHELL_CONFIG`.
    pub fn from_env() -> Self {
        let home = env::var_os("HOME").map(PathBuf::from);
        ShellConfig {
            history_file: home.as_ref().map(|h| h.join(".gshell_history")),
            rc_file: env::var_os("GSHELL_CONFIG").map(PathBuf::from),
            ..Self::default()
        }
    }
}
