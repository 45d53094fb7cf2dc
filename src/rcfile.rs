//! rc file discovery and loading
//!
//! The rc file runs exactly once, before the first prompt. Two flavors:
//! `~/.gshellrc.rhai` goes to the script host, plain `~/.gshellrc` is fed
//! line by line through the normal parse + execute path. `$GSHELL_CONFIG`
//! (or the config's `rc_file`) overrides discovery. A missing rc file is
//! not an error; a broken one warns and the REPL still starts.

use std::env;
use std::path::PathBuf;

use crate::config::ShellConfig;
use crate::script::SCRIPT_EXT;

/// Get home directory
pub fn dirs_home() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

/// Resolve which rc file to run, if any. Explicit override first, then
/// the scripted variant, then the plain one.
pub fn find_rc(config: &ShellConfig) -> Option<PathBuf> {
    if let Some(path) = &config.rc_file {
        return path.exists().then(|| path.clone());
    }
    let home = dirs_home()?;
    let scripted = home.join(format!(".gshellrc.{}", SCRIPT_EXT));
    if scripted.exists() {
        return Some(scripted);
    }
    let plain = home.join(".gshellrc");
    plain.exists().then_some(plain)
}

/// True when the path should be handed to the script host rather than the
/// line-mode loader.
pub fn is_scripted(path: &std::path::Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_extension_is_detected() {
        assert!(is_scripted(std::path::Path::new("/home/u/.gshellrc.rhai")));
        assert!(!is_scripted(std::path::Path::new("/home/u/.gshellrc")));
    }

    #[test]
    fn explicit_override_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("custom_rc");
        std::fs::write(&rc, "# empty\n").unwrap();
        let config = ShellConfig {
            rc_file: Some(rc.clone()),
            ..ShellConfig::default()
        };
        assert_eq!(find_rc(&config), Some(rc));
    }

    #[test]
    fn missing_override_means_no_rc() {
        let config = ShellConfig {
            rc_file: Some(PathBuf::from("/definitely/missing/rc")),
            ..ShellConfig::default()
        };
        assert_eq!(find_rc(&config), None);
    }
}
