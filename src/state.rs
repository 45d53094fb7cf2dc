//! Shell state management
//!
//! `ShellState` is the process-wide mutable state owned by the REPL for the
//! shell's lifetime: the environment map, alias map, background job table,
//! and the exit/termination flags. Signal handlers never touch this; they
//! set atomic flags in [`crate::signals`] and the REPL applies the effects
//! here between iterations.

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum NameError {
    #[error("invalid variable name: {0:?}")]
    InvalidVariable(String),
    #[error("invalid alias name: {0:?}")]
    InvalidAlias(String),
}

/// Lifecycle of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
    Done,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Stopped => "stopped",
            JobStatus::Done => "done",
        }
    }
}

/// One background job. `id` is unique and strictly increasing per session.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: u32,
    pub pid: i32,
    pub command: String,
    pub status: JobStatus,
}

/// Shell state that persists between commands
#[derive(Debug, Default)]
pub struct ShellState {
    env: HashMap<String, String>,
    aliases: HashMap<String, String>,
    jobs: Vec<Job>,
    next_job_id: u32,
    /// Exit status of the last pipeline, `$?`.
    pub exit_code: i32,
    /// Set by the `exit` builtin; the REPL breaks when it sees this.
    pub should_exit: bool,
    /// History settings live here so the `history` builtin and the script
    /// host's `set_history_*` hooks can reach them.
    pub history_file: Option<PathBuf>,
    pub history_size: usize,
}

/// `[A-Za-z_][A-Za-z0-9_]*`, or purely numeric for script positional args.
pub fn is_valid_var_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    let mut bytes = name.bytes();
    let first = bytes.next().unwrap_or(b'0');
    (first == b'_' || first.is_ascii_alphabetic())
        && bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
}

/// `[A-Za-z0-9_][A-Za-z0-9_-]*`
pub fn is_valid_alias_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    let first = match bytes.next() {
        Some(b) => b,
        None => return false,
    };
    (first == b'_' || first.is_ascii_alphanumeric())
        && bytes.all(|b| b == b'_' || b == b'-' || b.is_ascii_alphanumeric())
}

impl ShellState {
    /// Seed from the process environment.
    pub fn new() -> Self {
        let mut state = ShellState {
            history_size: crate::config::DEFAULT_HISTORY_SIZE,
            ..Self::default()
        };
        for (key, value) in std::env::vars() {
            if is_valid_var_name(&key) {
                state.env.insert(key, value);
            }
        }
        state
    }

    // --- environment ---

    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(|s| s.as_str())
    }

    pub fn set_var(&mut self, name: &str, value: &str) -> Result<(), NameError> {
        if !is_valid_var_name(name) {
            return Err(NameError::InvalidVariable(name.to_string()));
        }
        self.env.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn unset_var(&mut self, name: &str) {
        self.env.remove(name);
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Environment entries sorted by name, for `export` with no args.
    pub fn env_sorted(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .env
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    // --- aliases ---

    pub fn get_alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(|s| s.as_str())
    }

    pub fn set_alias(&mut self, name: &str, expansion: &str) -> Result<(), NameError> {
        if !is_valid_alias_name(name) {
            return Err(NameError::InvalidAlias(name.to_string()));
        }
        self.aliases.insert(name.to_string(), expansion.to_string());
        Ok(())
    }

    /// Returns true if the alias existed.
    pub fn remove_alias(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    pub fn clear_aliases(&mut self) {
        self.aliases.clear();
    }

    pub fn aliases_sorted(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .aliases
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    // --- jobs ---

    /// Register a background job and return its id.
    pub fn add_job(&mut self, pid: i32, command: String) -> u32 {
        self.next_job_id += 1;
        let id = self.next_job_id;
        self.jobs.push(Job {
            id,
            pid,
            command,
            status: JobStatus::Running,
        });
        id
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job_mut(&mut self, id: u32) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn last_job_id(&self) -> Option<u32> {
        self.jobs.last().map(|j| j.id)
    }

    /// Mark the job owning `pid` as done. Called from the SIGCHLD drain.
    pub fn mark_job_done(&mut self, pid: i32) {
        if let Some(job) = self.jobs.iter_mut().find(|j| j.pid == pid) {
            job.status = JobStatus::Done;
        }
    }

    /// Drop jobs that finished and have been reported to the user.
    pub fn reap_done_jobs(&mut self) {
        self.jobs.retain(|j| j.status != JobStatus::Done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_names_validate() {
        assert!(is_valid_var_name("PATH"));
        assert!(is_valid_var_name("_private"));
        assert!(is_valid_var_name("arg2x"));
        assert!(is_valid_var_name("0"));
        assert!(is_valid_var_name("12"));
        assert!(!is_valid_var_name(""));
        assert!(!is_valid_var_name("2fast"));
        assert!(!is_valid_var_name("with-dash"));
        assert!(!is_valid_var_name("sp ace"));
    }

    #[test]
    fn alias_names_validate() {
        assert!(is_valid_alias_name("ll"));
        assert!(is_valid_alias_name("git-st"));
        assert!(is_valid_alias_name("2v"));
        assert!(!is_valid_alias_name(""));
        assert!(!is_valid_alias_name("-leading"));
        assert!(!is_valid_alias_name("ha s"));
    }

    #[test]
    fn set_var_rejects_bad_name() {
        let mut state = ShellState::default();
        assert!(state.set_var("GOOD", "1").is_ok());
        assert_eq!(state.get_var("GOOD"), Some("1"));
        assert!(state.set_var("not ok", "1").is_err());
        state.unset_var("GOOD");
        assert_eq!(state.get_var("GOOD"), None);
    }

    #[test]
    fn job_ids_strictly_increase() {
        let mut state = ShellState::default();
        let a = state.add_job(100, "sleep 1".into());
        let b = state.add_job(101, "sleep 2".into());
        assert!(b > a);
        state.mark_job_done(100);
        assert_eq!(
            state.jobs().iter().find(|j| j.id == a).map(|j| j.status),
            Some(JobStatus::Done)
        );
        state.reap_done_jobs();
        assert!(state.jobs().iter().all(|j| j.id != a));
        // ids never reused
        let c = state.add_job(102, "sleep 3".into());
        assert!(c > b);
    }

    #[test]
    fn aliases_round_trip() {
        let mut state = ShellState::default();
        state.set_alias("ll", "ls -la").unwrap();
        assert_eq!(state.get_alias("ll"), Some("ls -la"));
        assert!(state.remove_alias("ll"));
        assert!(!state.remove_alias("ll"));
    }
}
