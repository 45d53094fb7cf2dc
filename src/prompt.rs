//! Prompt rendering
//!
//! The REPL assembles a [`PromptContext`] each iteration and hands it to
//! whatever [`PromptRenderer`] is plugged in. Rendering is allowed to
//! fail; the REPL then falls back to the config's literal prompt string,
//! so a broken renderer can never take the shell down.

use std::fmt;

use crate::state::ShellState;

/// Everything a renderer may want to show.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub user: String,
    pub host: String,
    pub cwd: String,
    pub last_status: i32,
    pub jobs: usize,
}

impl PromptContext {
    /// Snapshot the current shell state. `$HOME` is abbreviated to `~`.
    pub fn gather(state: &ShellState) -> Self {
        let user = state
            .get_var("USER")
            .map(String::from)
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_default());
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut cwd = std::env::current_dir()
            .map(|d| d.display().to_string())
            .unwrap_or_default();
        if let Some(home) = state.get_var("HOME") {
            if !home.is_empty() && cwd.starts_with(home) {
                cwd = cwd.replacen(home, "~", 1);
            }
        }
        PromptContext {
            user,
            host,
            cwd,
            last_status: state.exit_code,
            jobs: state.jobs().len(),
        }
    }
}

#[derive(Debug)]
pub struct PromptError(pub String);

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prompt renderer failed: {}", self.0)
    }
}

impl std::error::Error for PromptError {}

pub trait PromptRenderer {
    fn render(&self, ctx: &PromptContext) -> Result<String, PromptError>;
}

/// Default renderer: expands `{user}`, `{host}`, `{cwd}`, `{status}` and
/// `{jobs}` in a template. A non-zero status is painted red unless
/// `NO_COLOR` is set.
#[derive(Debug, Clone)]
pub struct TemplatePrompt {
    template: String,
    color: bool,
}

impl TemplatePrompt {
    pub fn new(template: &str) -> Self {
        TemplatePrompt {
            template: template.to_string(),
            color: std::env::var_os("NO_COLOR").is_none(),
        }
    }
}

impl PromptRenderer for TemplatePrompt {
    fn render(&self, ctx: &PromptContext) -> Result<String, PromptError> {
        let status = if ctx.last_status != 0 && self.color {
            format!("\x1b[31m{}\x1b[0m", ctx.last_status)
        } else {
            ctx.last_status.to_string()
        };
        Ok(self
            .template
            .replace("{user}", &ctx.user)
            .replace("{host}", &ctx.host)
            .replace("{cwd}", &ctx.cwd)
            .replace("{status}", &status)
            .replace("{jobs}", &ctx.jobs.to_string()))
    }
}

/// Render with `renderer`, falling back to the literal template when it
/// fails.
pub fn render_or_fallback(
    renderer: &dyn PromptRenderer,
    ctx: &PromptContext,
    fallback: &str,
) -> String {
    renderer.render(ctx).unwrap_or_else(|_| fallback.to_string())
}
