//! Tab completion
//!
//! The editor hands the buffer and cursor to a [`CompletionProvider`] and
//! gets back candidate words plus their longest common prefix. The default
//! provider completes command names (builtins, then `$PATH` executables)
//! in first-word position and filesystem paths everywhere else.

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::editor::CommandValidator;

/// Result of one completion query.
#[derive(Debug, Default, Clone)]
pub struct Completion {
    /// Byte offset where the completed word starts in the buffer.
    pub start: usize,
    /// Longest prefix shared by every match (at least the typed prefix).
    pub common_prefix: String,
    pub matches: Vec<String>,
}

pub trait CompletionProvider {
    fn complete(&self, buffer: &str, cursor: usize) -> Completion;
}

/// Longest common prefix of a sorted, non-empty candidate list.
fn common_prefix_of(matches: &[String]) -> String {
    let mut prefix = match matches.first() {
        Some(first) => first.clone(),
        None => return String::new(),
    };
    for candidate in &matches[1..] {
        let shared = prefix
            .char_indices()
            .zip(candidate.chars())
            .take_while(|((_, a), b)| a == b)
            .count();
        let end = prefix
            .char_indices()
            .nth(shared)
            .map(|(i, _)| i)
            .unwrap_or(prefix.len());
        prefix.truncate(end);
        if prefix.is_empty() {
            break;
        }
    }
    prefix
}

/// Default completer over builtins, `$PATH` and the filesystem.
#[derive(Debug, Default)]
pub struct PathCompleter;

/// Cap on `$PATH` scan results so a huge bin directory stays snappy.
const MAX_PATH_MATCHES: usize = 100;

const BUILTIN_NAMES: &[&str] = &[
    "alias", "bg", "cd", "echo", "exit", "export", "fg", "help", "history", "jobs",
    "net-fetch", "net-resolve", "net-scan", "net-test", "pwd", "source", "unalias", "unset",
];

impl PathCompleter {
    /// Builtins and executables on `$PATH` matching the prefix.
    fn complete_command(&self, prefix: &str) -> Vec<String> {
        let mut completions: BTreeSet<String> = BUILTIN_NAMES
            .iter()
            .filter(|b| b.starts_with(prefix))
            .map(|b| b.to_string())
            .collect();

        if let Ok(path) = std::env::var("PATH") {
            'outer: for dir in path.split(':') {
                if let Ok(entries) = fs::read_dir(dir) {
                    for entry in entries.filter_map(|e| e.ok()) {
                        if let Some(name) = entry.file_name().to_str() {
                            if name.starts_with(prefix) {
                                completions.insert(name.to_string());
                                if completions.len() >= MAX_PATH_MATCHES {
                                    break 'outer;
                                }
                            }
                        }
                    }
                }
            }
        }

        completions.into_iter().collect()
    }

    /// Filesystem entries matching a path prefix; directories keep a `/`.
    fn complete_path(&self, prefix: &str) -> Vec<String> {
        let expanded = if let Some(rest) = prefix.strip_prefix('~') {
            match std::env::var("HOME") {
                Ok(home) => format!("{}{}", home, rest),
                Err(_) => prefix.to_string(),
            }
        } else {
            prefix.to_string()
        };

        let (dir, file_prefix) = match expanded.rfind('/') {
            Some(idx) => (&expanded[..=idx], &expanded[idx + 1..]),
            None => ("./", expanded.as_str()),
        };

        let mut completions = Vec::new();
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.filter_map(|e| e.ok()) {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with(file_prefix) {
                        continue;
                    }
                    if file_prefix.is_empty() && name.starts_with('.') {
                        continue;
                    }
                    let shown_dir = if dir == "./" && !prefix.contains('/') {
                        ""
                    } else {
                        dir
                    };
                    let mut full = format!("{}{}", shown_dir, name);
                    if prefix.starts_with('~') {
                        if let Ok(home) = std::env::var("HOME") {
                            full = full.replacen(&home, "~", 1);
                        }
                    }
                    if entry.path().is_dir() {
                        full.push('/');
                    }
                    completions.push(full);
                }
            }
        }
        completions.sort();
        completions
    }
}

impl CompletionProvider for PathCompleter {
    fn complete(&self, buffer: &str, cursor: usize) -> Completion {
        let head = &buffer[..cursor];
        let start = head
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let prefix = &head[start..];

        if prefix.is_empty() {
            return Completion {
                start,
                ..Completion::default()
            };
        }

        let first_word = head[..start].trim().is_empty();
        let matches = if prefix.contains('/') || prefix.starts_with('~') || prefix.starts_with('.')
        {
            self.complete_path(prefix)
        } else if first_word {
            self.complete_command(prefix)
        } else {
            self.complete_path(prefix)
        };

        Completion {
            start,
            common_prefix: common_prefix_of(&matches),
            matches,
        }
    }
}

/// Name-resolution check for highlighters: builtins, explicit paths, and
/// executables on `$PATH` all count as existing.
#[derive(Debug, Default)]
pub struct PathCommandValidator;

impl CommandValidator for PathCommandValidator {
    fn exists(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        if crate::builtins::lookup(name).is_some() {
            return true;
        }
        if name.contains('/') {
            return is_executable(Path::new(name));
        }
        std::env::var("PATH")
            .map(|path| {
                path.split(':')
                    .any(|dir| is_executable(&Path::new(dir).join(name)))
            })
            .unwrap_or(false)
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
