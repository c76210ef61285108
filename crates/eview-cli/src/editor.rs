//! Minimal multi-line text editor backing the command, script and path fields.

use eview::Editor;

/// Text plus a cursor, kept on a char boundary.
#[derive(Clone, Debug, Default)]
pub struct EditorPane {
    text: String,
    cursor: usize,
}

impl EditorPane {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.len(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn before(&self) -> &str {
        self.text.get(..self.cursor).unwrap_or_default()
    }

    fn after(&self) -> &str {
        self.text.get(self.cursor..).unwrap_or_default()
    }

    fn line_start(&self) -> usize {
        self.before().rfind('\n').map_or(0, |newline| newline + 1)
    }

    fn line_end(&self) -> usize {
        self.cursor + self.after().find('\n').unwrap_or(self.after().len())
    }

    /// Zero-based (row, column) of the cursor, in chars.
    pub fn cursor_position(&self) -> (usize, usize) {
        let before = self.before();
        let row = before.matches('\n').count();
        let column = before
            .get(self.line_start()..)
            .map_or(0, |line| line.chars().count());
        (row, column)
    }

    pub fn insert(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    /// Delete the char before the cursor. Returns whether anything changed.
    pub fn backspace(&mut self) -> bool {
        match self.before().char_indices().next_back() {
            Some((at, _)) => {
                self.text.remove(at);
                self.cursor = at;
                true
            }
            None => false,
        }
    }

    /// Delete the char under the cursor. Returns whether anything changed.
    pub fn delete(&mut self) -> bool {
        if self.cursor < self.text.len() {
            self.text.remove(self.cursor);
            true
        } else {
            false
        }
    }

    pub fn left(&mut self) {
        if let Some((at, _)) = self.before().char_indices().next_back() {
            self.cursor = at;
        }
    }

    pub fn right(&mut self) {
        if let Some(ch) = self.after().chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub fn home(&mut self) {
        self.cursor = self.line_start();
    }

    pub fn end(&mut self) {
        self.cursor = self.line_end();
    }

    pub fn up(&mut self) {
        let start = self.line_start();
        if start == 0 {
            self.cursor = 0;
            return;
        }
        let (_, column) = self.cursor_position();
        let previous_end = start - 1;
        let previous_start = self
            .text
            .get(..previous_end)
            .and_then(|text| text.rfind('\n'))
            .map_or(0, |newline| newline + 1);
        let line = self.text.get(previous_start..previous_end).unwrap_or_default();
        self.cursor = previous_start + column_offset(line, column);
    }

    pub fn down(&mut self) {
        let end = self.line_end();
        if end == self.text.len() {
            self.cursor = end;
            return;
        }
        let (_, column) = self.cursor_position();
        let next_start = end + 1;
        let rest = self.text.get(next_start..).unwrap_or_default();
        let line = rest.split('\n').next().unwrap_or_default();
        self.cursor = next_start + column_offset(line, column);
    }
}

/// Byte offset of char `column` in `line`, clamped to the line's end.
fn column_offset(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map_or(line.len(), |(offset, _)| offset)
}

impl Editor for EditorPane {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.text);
        self.cursor = self.text.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_appends_at_cursor() {
        let mut editor = EditorPane::new("plot");
        editor.insert(' ');
        editor.insert('x');
        assert_eq!(editor.as_str(), "plot x");
    }

    #[test]
    fn backspace_handles_multibyte_chars() {
        let mut editor = EditorPane::new("α≤β");
        assert!(editor.backspace());
        assert_eq!(editor.as_str(), "α≤");
        editor.left();
        assert!(editor.backspace());
        assert_eq!(editor.as_str(), "≤");
        assert!(!editor.backspace());
    }

    #[test]
    fn delete_removes_char_under_cursor() {
        let mut editor = EditorPane::new("ab");
        editor.home();
        assert!(editor.delete());
        assert_eq!(editor.as_str(), "b");
        editor.end();
        assert!(!editor.delete());
    }

    #[test]
    fn vertical_moves_keep_column_when_possible() {
        let mut editor = EditorPane::new("set term png\nplot\nplot sin(x)");
        assert_eq!(editor.cursor_position(), (2, 11));
        editor.up();
        assert_eq!(editor.cursor_position(), (1, 4));
        editor.up();
        assert_eq!(editor.cursor_position(), (0, 4));
        editor.down();
        editor.down();
        assert_eq!(editor.cursor_position(), (2, 4));
        editor.down();
        assert_eq!(editor.cursor_position(), (2, 11));
    }

    #[test]
    fn home_and_end_stay_on_the_line() {
        let mut editor = EditorPane::new("one\ntwo");
        editor.home();
        assert_eq!(editor.cursor_position(), (1, 0));
        editor.insert('>');
        editor.end();
        assert_eq!(editor.cursor_position(), (1, 4));
        assert_eq!(editor.as_str(), "one\n>two");
    }

    #[test]
    fn set_text_moves_cursor_to_end() {
        let mut editor = EditorPane::default();
        editor.set_text("a\nbc");
        assert_eq!(editor.text(), "a\nbc");
        assert_eq!(editor.cursor_position(), (1, 2));
    }
}
