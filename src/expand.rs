//! Variable expansion and alias substitution
//!
//! Runs per argument, inside the executor, immediately before dispatch.
//! Single-quoted words pass through untouched; bare and double-quoted
//! words get `$NAME` rewritten from the environment. `$?` is the last
//! pipeline status. A bare word that expands to nothing is dropped from
//! argv, so a command made only of unset variables is elided entirely.

use crate::parser::{Command, Quote};
use crate::state::ShellState;

fn is_name_byte(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '?'
}

/// Expand `$NAME` references in one argument. NAME is the maximal
/// `[A-Za-z0-9_?]+` run after the `$`; unset names expand to nothing.
pub fn expand_arg(text: &str, state: &ShellState) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if is_name_byte(next) {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            // a lone `$` stays literal
            out.push('$');
        } else if name == "?" {
            out.push_str(&state.exit_code.to_string());
        } else if let Some(value) = state.get_var(&name) {
            out.push_str(value);
        }
    }

    out
}

/// Expand a command's argv into plain strings, honoring quote provenance.
pub fn expand_argv(command: &Command, state: &ShellState) -> Vec<String> {
    let mut argv = Vec::with_capacity(command.argv.len());
    for arg in &command.argv {
        match arg.quote {
            Quote::Single => argv.push(arg.text.clone()),
            Quote::Double => argv.push(expand_arg(&arg.text, state)),
            Quote::None => {
                let expanded = expand_arg(&arg.text, state);
                if !expanded.is_empty() {
                    argv.push(expanded);
                }
            }
        }
    }
    argv
}

/// Replace argv[0] by its alias expansion, once. The expansion is split on
/// ASCII whitespace with no re-quoting, and the remaining argv follows it.
/// Never recursive: a single substitution per dispatch.
pub fn apply_alias(argv: &mut Vec<String>, state: &ShellState) {
    let head = match argv.first() {
        Some(head) => head,
        None => return,
    };
    if let Some(expansion) = state.get_alias(head) {
        let mut replaced: Vec<String> = expansion
            .split_ascii_whitespace()
            .map(String::from)
            .collect();
        replaced.extend(argv.drain(1..));
        *argv = replaced;
    }
}
