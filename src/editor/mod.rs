//! Raw-mode line editor
//!
//! One raw-mode session per logical line: on entry the terminal's
//! canonical processing, echo, flow control and CR translation are
//! switched off (`VMIN=1 VTIME=0`), and an RAII guard restores the saved
//! termios on every exit path. Input is read a byte at a time and
//! reassembled into UTF-8; the cursor moves by grapheme cluster.
//!
//! Three modes: NORMAL editing, HISTORY navigation after the first
//! Up-arrow, and SEARCH after Ctrl-R. Every mutation redraws the line:
//! carriage return, prompt, buffer, padding for anything the new text no
//! longer covers, then the cursor walks back left with `ESC [ N D`.

pub mod buffer;

pub use buffer::{display_width, EditorBuffer};

use std::io::{self, Write};

use nix::errno::Errno;
use nix::sys::termios::{
    self, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices, Termios,
};
use thiserror::Error;

use crate::complete::CompletionProvider;
use crate::signals;

/// Hard cap on one logical line.
const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("input line too long")]
    LineTooLong,
    #[error("interrupted")]
    OperationAborted,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Styles a line for display; must only add ANSI escapes, never visible
/// characters, so cursor arithmetic stays in plain-text cells.
pub trait Highlighter {
    fn highlight(&self, line: &str) -> String;
}

/// No styling.
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, line: &str) -> String {
        line.to_string()
    }
}

/// Used by highlighters to decide whether a command name resolves.
pub trait CommandValidator {
    fn exists(&self, name: &str) -> bool;
}

/// Restores the saved termios when dropped, whatever path leaves the
/// session.
struct RawModeGuard {
    original: Termios,
}

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        let stdin = io::stdin();
        let original =
            termios::tcgetattr(&stdin).map_err(|e| io::Error::from_raw_os_error(e as i32))?;
        let mut raw = original.clone();
        raw.local_flags
            .remove(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG);
        raw.input_flags.remove(InputFlags::IXON | InputFlags::ICRNL);
        raw.output_flags.remove(OutputFlags::OPOST);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)
            .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
        Ok(RawModeGuard { original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // best effort; a failure here leaves the terminal to `reset`
        let _ = termios::tcsetattr(&io::stdin(), SetArg::TCSANOW, &self.original);
    }
}

#[derive(Debug)]
enum Mode {
    Normal,
    /// Walking history entries; `saved` is the live buffer to restore.
    History { saved: String, index: usize },
    /// Reverse incremental search; `found` indexes the history slice.
    Search { query: String, found: Option<usize> },
}

pub struct LineEditor<'a> {
    history: &'a [String],
    completer: &'a dyn CompletionProvider,
    highlighter: &'a dyn Highlighter,
}

impl<'a> LineEditor<'a> {
    pub fn new(
        history: &'a [String],
        completer: &'a dyn CompletionProvider,
        highlighter: &'a dyn Highlighter,
    ) -> Self {
        LineEditor {
            history,
            completer,
            highlighter,
        }
    }

    /// Read one logical line. `Ok(None)` is EOF (Ctrl-D on an empty
    /// buffer or a closed stdin).
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>, EditorError> {
        let _guard = RawModeGuard::enter()?;
        let mut out = io::stdout();
        let mut buffer = EditorBuffer::new();
        let mut mode = Mode::Normal;
        // display width of what the previous redraw left on screen
        let mut drawn = 0usize;

        write!(out, "\r{}", prompt)?;
        out.flush()?;

        loop {
            let byte = match self.read_byte()? {
                Some(byte) => byte,
                None => {
                    // stdin closed
                    write!(out, "\r\n")?;
                    out.flush()?;
                    if buffer.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(buffer.into_string()));
                }
            };

            if signals::take_sigtstp() {
                write!(out, "\r\n[gshell] job control is not available\r\n")?;
                drawn = 0;
                self.redraw(&mut out, prompt, &buffer, &mut drawn)?;
                continue;
            }

            if let Mode::Search { .. } = mode {
                match self.handle_search_key(byte, &mut mode, &mut buffer, &mut out, &mut drawn)? {
                    SearchStep::Continue => continue,
                    SearchStep::Accept => {
                        write!(out, "\r\n")?;
                        out.flush()?;
                        return Ok(Some(buffer.into_string()));
                    }
                    SearchStep::Cancelled => {
                        self.redraw(&mut out, prompt, &buffer, &mut drawn)?;
                        continue;
                    }
                }
            }

            match byte {
                b'\r' | b'\n' => {
                    write!(out, "\r\n")?;
                    out.flush()?;
                    return Ok(Some(buffer.into_string()));
                }
                0x03 => {
                    // Ctrl-C: discard the line
                    write!(out, "^C\r\n")?;
                    out.flush()?;
                    return Err(EditorError::OperationAborted);
                }
                0x04 => {
                    // Ctrl-D: EOF only on an empty buffer
                    if buffer.is_empty() {
                        write!(out, "\r\n")?;
                        out.flush()?;
                        return Ok(None);
                    }
                }
                0x01 => {
                    buffer.move_home();
                    self.redraw(&mut out, prompt, &buffer, &mut drawn)?;
                }
                0x05 => {
                    buffer.move_end();
                    self.redraw(&mut out, prompt, &buffer, &mut drawn)?;
                }
                0x12 => {
                    mode = Mode::Search {
                        query: String::new(),
                        found: None,
                    };
                    self.redraw_search(&mut out, &mode, &mut drawn)?;
                }
                0x08 | 0x7f => {
                    if buffer.delete_left() {
                        self.redraw(&mut out, prompt, &buffer, &mut drawn)?;
                    }
                }
                0x09 => {
                    self.complete(&mut out, prompt, &mut buffer, &mut drawn)?;
                }
                0x1b => {
                    self.handle_escape(&mut mode, &mut buffer, &mut out, prompt, &mut drawn)?;
                }
                byte if byte >= 0x20 => {
                    let Some(text) = self.assemble_utf8(byte)? else {
                        continue;
                    };
                    if let Mode::History { .. } = mode {
                        // typing leaves history mode; the live save is gone
                        mode = Mode::Normal;
                    }
                    if buffer.len() + text.len() > MAX_LINE_BYTES {
                        write!(out, "\r\n")?;
                        out.flush()?;
                        return Err(EditorError::LineTooLong);
                    }
                    buffer.insert(&text);
                    self.redraw(&mut out, prompt, &buffer, &mut drawn)?;
                }
                _ => {}
            }
        }
    }

    /// Blocking single-byte read with cooperative signal drains.
    fn read_byte(&self) -> Result<Option<u8>, EditorError> {
        let mut byte = [0u8; 1];
        loop {
            match nix::unistd::read(libc::STDIN_FILENO, &mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    if signals::take_sigint() {
                        return Err(EditorError::OperationAborted);
                    }
                    return Ok(Some(byte[0]));
                }
                Err(Errno::EINTR) => {
                    if signals::take_sigint() {
                        return Err(EditorError::OperationAborted);
                    }
                    // SIGCHLD stays flagged for the REPL loop boundary
                }
                Err(e) => return Err(EditorError::Io(io::Error::from_raw_os_error(e as i32))),
            }
        }
    }

    /// Reassemble a UTF-8 scalar starting from its lead byte. Invalid
    /// sequences are dropped silently.
    fn assemble_utf8(&self, lead: u8) -> Result<Option<String>, EditorError> {
        let len = match lead {
            b if b < 0x80 => 1,
            b if b & 0xE0 == 0xC0 => 2,
            b if b & 0xF0 == 0xE0 => 3,
            b if b & 0xF8 == 0xF0 => 4,
            _ => return Ok(None),
        };
        let mut bytes = vec![lead];
        while bytes.len() < len {
            match self.read_byte()? {
                Some(b) => bytes.push(b),
                None => return Ok(None),
            }
        }
        Ok(String::from_utf8(bytes).ok())
    }

    fn handle_escape(
        &mut self,
        mode: &mut Mode,
        buffer: &mut EditorBuffer,
        out: &mut io::Stdout,
        prompt: &str,
        drawn: &mut usize,
    ) -> Result<(), EditorError> {
        let Some(b'[') = self.read_byte()? else {
            // lone ESC or an unsupported sequence; swallow the byte read
            return Ok(());
        };
        let Some(code) = self.read_byte()? else {
            return Ok(());
        };
        match code {
            b'A' => self.history_up(mode, buffer),
            b'B' => self.history_down(mode, buffer),
            b'C' => {
                buffer.move_right();
            }
            b'D' => {
                buffer.move_left();
            }
            b'H' => buffer.move_home(),
            b'F' => buffer.move_end(),
            b'3' => {
                if self.read_byte()? == Some(b'~') {
                    buffer.delete_right();
                }
            }
            _ => {
                // swallow any remaining parameter bytes of the sequence
                let mut trailing = code;
                while (0x30..0x40).contains(&trailing) {
                    match self.read_byte()? {
                        Some(b) => trailing = b,
                        None => break,
                    }
                }
                return Ok(());
            }
        }
        self.redraw(out, prompt, buffer, drawn)
    }

    /// Up-arrow: enter or continue HISTORY mode, walking to older entries.
    fn history_up(&self, mode: &mut Mode, buffer: &mut EditorBuffer) {
        if self.history.is_empty() {
            return;
        }
        match mode {
            Mode::Normal => {
                let saved = buffer.as_str().to_string();
                let index = self.history.len() - 1;
                buffer.set_text(&self.history[index]);
                *mode = Mode::History { saved, index };
            }
            Mode::History { index, .. } => {
                if *index > 0 {
                    *index -= 1;
                    buffer.set_text(&self.history[*index]);
                }
            }
            Mode::Search { .. } => {}
        }
    }

    /// Down-arrow: walk back toward the saved live buffer.
    fn history_down(&self, mode: &mut Mode, buffer: &mut EditorBuffer) {
        if let Mode::History { saved, index } = mode {
            *index += 1;
            if *index >= self.history.len() {
                buffer.set_text(saved);
                *mode = Mode::Normal;
            } else {
                buffer.set_text(&self.history[*index]);
            }
        }
    }

    /// Case-insensitive substring search, strictly older than `start`.
    fn search_back(&self, query: &str, start: usize) -> Option<usize> {
        let needle = query.to_lowercase();
        self.history[..start.min(self.history.len())]
            .iter()
            .rposition(|entry| entry.to_lowercase().contains(&needle))
    }

    fn handle_search_key(
        &mut self,
        byte: u8,
        mode: &mut Mode,
        buffer: &mut EditorBuffer,
        out: &mut io::Stdout,
        drawn: &mut usize,
    ) -> Result<SearchStep, EditorError> {
        let Mode::Search { query, found } = mode else {
            return Ok(SearchStep::Continue);
        };
        match byte {
            b'\r' | b'\n' => {
                if let Some(index) = *found {
                    buffer.set_text(&self.history[index]);
                }
                *mode = Mode::Normal;
                return Ok(SearchStep::Accept);
            }
            0x03 => {
                // cancel back to an empty prompt
                buffer.clear();
                *mode = Mode::Normal;
                return Ok(SearchStep::Cancelled);
            }
            0x12 => {
                // step to the next earlier match
                let start = (*found).unwrap_or(self.history.len());
                if let Some(index) = self.search_back(query, start) {
                    *found = Some(index);
                }
            }
            0x08 | 0x7f => {
                query.pop();
                *found = self.search_back(query, self.history.len());
            }
            0x1b => {
                // leave search; the line under edit is unchanged
                let _ = self.read_byte()?;
                let _ = self.read_byte()?;
                *mode = Mode::Normal;
                return Ok(SearchStep::Cancelled);
            }
            byte if byte >= 0x20 => {
                if let Some(text) = self.assemble_utf8(byte)? {
                    query.push_str(&text);
                    *found = self.search_back(query, self.history.len());
                }
            }
            _ => {}
        }
        self.redraw_search(out, mode, drawn)?;
        Ok(SearchStep::Continue)
    }

    /// Full-line redraw: `\r`, prompt, styled buffer, padding over what
    /// the previous draw covered, cursor walked left into position.
    fn redraw(
        &self,
        out: &mut io::Stdout,
        prompt: &str,
        buffer: &EditorBuffer,
        drawn: &mut usize,
    ) -> Result<(), EditorError> {
        let line_width = buffer.width();
        let cursor_width = buffer.width_before_cursor();
        write!(out, "\r{}{}", prompt, self.highlighter.highlight(buffer.as_str()))?;

        let pad = drawn.saturating_sub(line_width);
        for _ in 0..pad {
            out.write_all(b" ")?;
        }
        let back = pad + (line_width - cursor_width);
        if back > 0 {
            write!(out, "\x1b[{}D", back)?;
        }
        *drawn = line_width;
        out.flush()?;
        Ok(())
    }

    /// Overwrite the line with the reverse-i-search prompt.
    fn redraw_search(
        &self,
        out: &mut io::Stdout,
        mode: &Mode,
        drawn: &mut usize,
    ) -> Result<(), EditorError> {
        let Mode::Search { query, found } = mode else {
            return Ok(());
        };
        let text = match found {
            Some(index) => format!("(reverse-i-search)`{}': {}", query, self.history[*index]),
            None if query.is_empty() => "(reverse-i-search)`': ".to_string(),
            None => format!("(failed reverse-i-search)`{}': ", query),
        };
        let width = display_width(&text);
        write!(out, "\r{}", text)?;
        let pad = drawn.saturating_sub(width);
        for _ in 0..pad {
            out.write_all(b" ")?;
        }
        if pad > 0 {
            write!(out, "\x1b[{}D", pad)?;
        }
        *drawn = width;
        out.flush()?;
        Ok(())
    }

    /// Tab: ask the completion provider and apply its answer.
    fn complete(
        &mut self,
        out: &mut io::Stdout,
        prompt: &str,
        buffer: &mut EditorBuffer,
        drawn: &mut usize,
    ) -> Result<(), EditorError> {
        let completion = self.completer.complete(buffer.as_str(), buffer.cursor());
        match completion.matches.len() {
            0 => Ok(()),
            1 => {
                buffer.replace_to_cursor(completion.start, &completion.matches[0]);
                self.redraw(out, prompt, buffer, drawn)
            }
            _ => {
                let typed = buffer.cursor() - completion.start;
                if completion.common_prefix.len() > typed {
                    buffer.replace_to_cursor(completion.start, &completion.common_prefix);
                }
                write!(out, "\r\n")?;
                self.print_columns(out, &completion.matches)?;
                *drawn = 0;
                self.redraw(out, prompt, buffer, drawn)
            }
        }
    }

    /// Columnar candidate listing sized to the terminal width.
    fn print_columns(&self, out: &mut io::Stdout, items: &[String]) -> Result<(), EditorError> {
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);
        let col = items.iter().map(|s| display_width(s)).max().unwrap_or(1) + 2;
        let per_row = (term_width / col).max(1);
        for row in items.chunks(per_row) {
            for item in row {
                let pad = col - display_width(item);
                write!(out, "{}{}", item, " ".repeat(pad))?;
            }
            write!(out, "\r\n")?;
        }
        Ok(())
    }
}

enum SearchStep {
    Continue,
    Accept,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complete::{Completion, CompletionProvider};

    struct NoCompletion;
    impl CompletionProvider for NoCompletion {
        fn complete(&self, _buffer: &str, cursor: usize) -> Completion {
            Completion {
                start: cursor,
                ..Completion::default()
            }
        }
    }

    fn editor<'a>(history: &'a [String]) -> LineEditor<'a> {
        LineEditor::new(history, &NoCompletion, &PlainHighlighter)
    }

    fn entries(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn search_back_finds_most_recent_match() {
        let history = entries(&["make test", "grep foo src", "ls", "grep bar"]);
        let ed = editor(&history);
        assert_eq!(ed.search_back("grep", history.len()), Some(3));
        // stepping older from a hit skips it
        assert_eq!(ed.search_back("grep", 3), Some(1));
        assert_eq!(ed.search_back("grep", 1), None);
    }

    #[test]
    fn search_is_case_insensitive() {
        let history = entries(&["Make Test"]);
        let ed = editor(&history);
        assert_eq!(ed.search_back("make", history.len()), Some(0));
    }

    #[test]
    fn history_up_saves_live_buffer_and_down_restores() {
        let history = entries(&["one", "two"]);
        let ed = editor(&history);
        let mut mode = Mode::Normal;
        let mut buffer = EditorBuffer::new();
        buffer.insert("draft");

        ed.history_up(&mut mode, &mut buffer);
        assert_eq!(buffer.as_str(), "two");
        ed.history_up(&mut mode, &mut buffer);
        assert_eq!(buffer.as_str(), "one");
        // bottom of history: stays put
        ed.history_up(&mut mode, &mut buffer);
        assert_eq!(buffer.as_str(), "one");

        ed.history_down(&mut mode, &mut buffer);
        assert_eq!(buffer.as_str(), "two");
        ed.history_down(&mut mode, &mut buffer);
        assert_eq!(buffer.as_str(), "draft");
        assert!(matches!(mode, Mode::Normal));
    }

    #[test]
    fn history_up_on_empty_history_is_inert() {
        let history: Vec<String> = Vec::new();
        let ed = editor(&history);
        let mut mode = Mode::Normal;
        let mut buffer = EditorBuffer::new();
        ed.history_up(&mut mode, &mut buffer);
        assert!(buffer.is_empty());
        assert!(matches!(mode, Mode::Normal));
    }

    #[test]
    fn utf8_lead_byte_classification() {
        let history: Vec<String> = Vec::new();
        let ed = editor(&history);
        // ASCII assembles without further reads
        assert_eq!(ed.assemble_utf8(b'a').unwrap().as_deref(), Some("a"));
        // continuation byte alone is invalid and dropped
        assert_eq!(ed.assemble_utf8(0x80).unwrap(), None);
    }
}
