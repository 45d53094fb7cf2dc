//! The editor's line buffer
//!
//! A UTF-8 string plus a byte-offset cursor. The cursor is only ever
//! moved to grapheme-cluster boundaries, and every mutation keeps it
//! there, so a single Backspace removes a whole emoji ZWJ sequence and
//! arrow keys never land inside a combining run.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ZERO_WIDTH_JOINER: char = '\u{200D}';

/// Display cells one grapheme cluster occupies. ZWJ sequences render as a
/// single glyph, so they count as their base grapheme's width rather than
/// the sum of their parts.
pub fn grapheme_width(grapheme: &str) -> usize {
    if grapheme.contains(ZERO_WIDTH_JOINER) {
        grapheme
            .chars()
            .next()
            .and_then(UnicodeWidthChar::width)
            .unwrap_or(1)
    } else {
        UnicodeWidthStr::width(grapheme)
    }
}

/// Display width of a whole string, grapheme by grapheme.
pub fn display_width(text: &str) -> usize {
    text.graphemes(true).map(grapheme_width).sum()
}

#[derive(Debug, Default, Clone)]
pub struct EditorBuffer {
    text: String,
    cursor: usize,
}

impl EditorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Byte offset of the cursor; always a grapheme boundary.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Replace the whole contents, cursor to the end.
    pub fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        self.cursor = self.text.len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Insert at the cursor and advance past the insertion.
    pub fn insert(&mut self, s: &str) {
        self.text.insert_str(self.cursor, s);
        self.cursor += s.len();
    }

    /// Byte offset of the grapheme boundary left of the cursor.
    fn prev_boundary(&self) -> Option<usize> {
        self.text[..self.cursor]
            .grapheme_indices(true)
            .last()
            .map(|(i, _)| i)
    }

    /// Byte offset just past the grapheme right of the cursor.
    fn next_boundary(&self) -> Option<usize> {
        self.text[self.cursor..]
            .graphemes(true)
            .next()
            .map(|g| self.cursor + g.len())
    }

    /// Move one grapheme left; false at the start.
    pub fn move_left(&mut self) -> bool {
        match self.prev_boundary() {
            Some(i) => {
                self.cursor = i;
                true
            }
            None => false,
        }
    }

    /// Move one grapheme right; false at the end.
    pub fn move_right(&mut self) -> bool {
        match self.next_boundary() {
            Some(i) => {
                self.cursor = i;
                true
            }
            None => false,
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.len();
    }

    /// Delete the grapheme cluster left of the cursor; false at the start.
    pub fn delete_left(&mut self) -> bool {
        match self.prev_boundary() {
            Some(start) => {
                self.text.replace_range(start..self.cursor, "");
                self.cursor = start;
                true
            }
            None => false,
        }
    }

    /// Delete the grapheme cluster under/right of the cursor.
    pub fn delete_right(&mut self) -> bool {
        match self.next_boundary() {
            Some(end) => {
                self.text.replace_range(self.cursor..end, "");
                true
            }
            None => false,
        }
    }

    /// Replace the bytes from `start` up to the cursor (a completion's
    /// word) and land the cursor after the replacement.
    pub fn replace_to_cursor(&mut self, start: usize, replacement: &str) {
        self.text.replace_range(start..self.cursor, replacement);
        self.cursor = start + replacement.len();
    }

    /// Display width of the whole line.
    pub fn width(&self) -> usize {
        display_width(&self.text)
    }

    /// Display width of everything left of the cursor.
    pub fn width_before_cursor(&self) -> usize {
        display_width(&self.text[..self.cursor])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_move_ascii() {
        let mut buf = EditorBuffer::new();
        buf.insert("hello");
        assert_eq!(buf.as_str(), "hello");
        assert_eq!(buf.cursor(), 5);
        assert!(buf.move_left());
        buf.insert("X");
        assert_eq!(buf.as_str(), "hellXo");
    }

    #[test]
    fn backspace_removes_whole_zwj_sequence() {
        let mut buf = EditorBuffer::new();
        buf.insert("ab");
        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}"; // 👨‍👩‍👧
        buf.insert(family);
        assert!(buf.delete_left());
        assert_eq!(buf.as_str(), "ab");
        assert_eq!(buf.cursor(), 2);
    }

    #[test]
    fn combining_mark_moves_as_one() {
        let mut buf = EditorBuffer::new();
        buf.insert("e\u{0301}x"); // é as e + combining acute
        buf.move_home();
        assert!(buf.move_right());
        assert_eq!(buf.cursor(), "e\u{0301}".len());
    }

    #[test]
    fn delete_right_at_home() {
        let mut buf = EditorBuffer::new();
        buf.insert("ab");
        buf.move_home();
        assert!(buf.delete_right());
        assert_eq!(buf.as_str(), "b");
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn widths_follow_east_asian_rules() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("\u{4F60}\u{597D}"), 4); // 你好
        assert_eq!(display_width("e\u{0301}"), 1); // combining mark is zero
    }

    #[test]
    fn zwj_sequence_counts_base_width() {
        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
        assert_eq!(display_width(family), 2);
    }

    #[test]
    fn width_before_cursor_tracks_moves() {
        let mut buf = EditorBuffer::new();
        buf.insert("a\u{4F60}b"); // a 你 b
        buf.move_home();
        buf.move_right();
        assert_eq!(buf.width_before_cursor(), 1);
        buf.move_right();
        assert_eq!(buf.width_before_cursor(), 3);
    }

    #[test]
    fn moves_stop_at_edges() {
        let mut buf = EditorBuffer::new();
        assert!(!buf.move_left());
        assert!(!buf.move_right());
        assert!(!buf.delete_left());
        assert!(!buf.delete_right());
    }
}
