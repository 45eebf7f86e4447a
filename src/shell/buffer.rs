//! Editable line buffer
//!
//! The cursor is a char index into `text`. Every edit reports which parts of the
//! screen need refreshing so the session can issue at most one line write and one
//! cursor move per key.

/// Screen work requested by an edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Render {
    /// Rewrite the prompt line.
    pub redraw: bool,
    /// Move the terminal cursor to the buffer cursor.
    pub reposition: bool,
}

impl Render {
    pub const NONE: Render = Render { redraw: false, reposition: false };
    pub const CURSOR: Render = Render { redraw: false, reposition: true };
    pub const LINE: Render = Render { redraw: true, reposition: true };
}

#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    text: String,
    cursor: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text between the start of the line and the cursor.
    pub fn before_cursor(&self) -> &str {
        &self.text[..self.byte_pos(self.cursor)]
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) -> Render {
        let byte_pos = self.byte_pos(self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
        Render::LINE
    }

    /// Remove the char under the cursor (Delete).
    pub fn delete_forward(&mut self) -> Render {
        if self.cursor == self.len() {
            return Render::NONE;
        }
        let byte_pos = self.byte_pos(self.cursor);
        self.text.remove(byte_pos);
        Render::LINE
    }

    /// Remove the char before the cursor (Backspace).
    pub fn delete_backward(&mut self) -> Render {
        if self.cursor == 0 {
            return Render::NONE;
        }
        self.cursor -= 1;
        let byte_pos = self.byte_pos(self.cursor);
        self.text.remove(byte_pos);
        Render::LINE
    }

    pub fn move_left(&mut self) -> Render {
        if self.cursor == 0 {
            return Render::NONE;
        }
        self.cursor -= 1;
        Render::CURSOR
    }

    pub fn move_right(&mut self) -> Render {
        if self.cursor == self.len() {
            return Render::NONE;
        }
        self.cursor += 1;
        Render::CURSOR
    }

    /// Replace the whole line (history recall), cursor at the end.
    pub fn load(&mut self, text: &str) -> Render {
        self.text = text.to_string();
        self.cursor = self.len();
        Render::LINE
    }

    /// Replace the chars in `[start, end)` with `value` and put the cursor right after it.
    ///
    /// Out-of-range bounds are clamped to the buffer.
    pub fn replace_range(&mut self, start: usize, end: usize, value: &str) -> Render {
        let len = self.len();
        let end = end.min(len);
        let start = start.min(end);
        let start_byte = self.byte_pos(start);
        let end_byte = self.byte_pos(end);
        self.text.replace_range(start_byte..end_byte, value);
        self.cursor = start + value.chars().count();
        Render::LINE
    }

    fn byte_pos(&self, char_pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(text: &str) -> LineBuffer {
        let mut buf = LineBuffer::new();
        for c in text.chars() {
            buf.insert(c);
        }
        buf
    }

    fn assert_cursor_in_bounds(buf: &LineBuffer) {
        assert!(buf.cursor() <= buf.len(), "cursor {} > len {}", buf.cursor(), buf.len());
    }

    #[test]
    fn test_insert_advances_cursor() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.insert('h'), Render::LINE);
        buf.insert('i');
        assert_eq!(buf.as_str(), "hi");
        assert_eq!(buf.cursor(), 2);
    }

    #[test]
    fn test_insert_in_middle() {
        let mut buf = buffer("ac");
        buf.move_left();
        buf.insert('b');
        assert_eq!(buf.as_str(), "abc");
        assert_eq!(buf.cursor(), 2);
    }

    #[test]
    fn test_delete_forward_at_end_is_noop() {
        let mut buf = buffer("abc");
        assert_eq!(buf.delete_forward(), Render::NONE);
        assert_eq!(buf.as_str(), "abc");
        assert_eq!(buf.cursor(), 3);
    }

    #[test]
    fn test_delete_backward_at_start_is_noop() {
        let mut buf = buffer("abc");
        buf.move_left();
        buf.move_left();
        buf.move_left();
        assert_eq!(buf.delete_backward(), Render::NONE);
        assert_eq!(buf.as_str(), "abc");
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn test_delete_forward_and_backward() {
        let mut buf = buffer("abcd");
        buf.move_left();
        buf.move_left();
        assert_eq!(buf.delete_forward(), Render::LINE);
        assert_eq!(buf.as_str(), "abd");
        assert_eq!(buf.cursor(), 2);
        assert_eq!(buf.delete_backward(), Render::LINE);
        assert_eq!(buf.as_str(), "ad");
        assert_eq!(buf.cursor(), 1);
    }

    #[test]
    fn test_moves_only_reposition() {
        let mut buf = buffer("ab");
        assert_eq!(buf.move_right(), Render::NONE);
        assert_eq!(buf.move_left(), Render::CURSOR);
        assert_eq!(buf.move_left(), Render::CURSOR);
        assert_eq!(buf.move_left(), Render::NONE);
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn test_multibyte_chars_are_one_step() {
        let mut buf = buffer("héllo");
        assert_eq!(buf.len(), 5);
        buf.move_left();
        buf.move_left();
        buf.move_left();
        buf.delete_backward();
        assert_eq!(buf.as_str(), "hllo");
        assert_eq!(buf.before_cursor(), "h");
    }

    #[test]
    fn test_load_puts_cursor_at_end() {
        let mut buf = buffer("old");
        buf.move_left();
        assert_eq!(buf.load("new text"), Render::LINE);
        assert_eq!(buf.as_str(), "new text");
        assert_eq!(buf.cursor(), 8);
    }

    #[test]
    fn test_replace_range() {
        let mut buf = buffer("cd src/ma tail");
        buf.replace_range(7, 9, "main.rs");
        assert_eq!(buf.as_str(), "cd src/main.rs tail");
        assert_eq!(buf.cursor(), 14);
    }

    #[test]
    fn test_replace_empty_range_inserts() {
        let mut buf = buffer("ls src/");
        buf.replace_range(7, 7, "lib.rs");
        assert_eq!(buf.as_str(), "ls src/lib.rs");
        assert_eq!(buf.cursor(), 13);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut buf = LineBuffer::new();
        let script: &[fn(&mut LineBuffer) -> Render] = &[
            LineBuffer::delete_backward,
            LineBuffer::delete_forward,
            LineBuffer::move_left,
            LineBuffer::move_right,
            |b| b.insert('x'),
            LineBuffer::move_left,
            LineBuffer::delete_forward,
            LineBuffer::delete_forward,
            |b| b.replace_range(5, 9, "yz"),
            LineBuffer::move_right,
            LineBuffer::delete_backward,
            LineBuffer::delete_backward,
            LineBuffer::delete_backward,
        ];
        for op in script {
            op(&mut buf);
            assert_cursor_in_bounds(&buf);
        }
        buf.clear();
        assert_eq!(buf.cursor(), 0);
        assert!(buf.is_empty());
    }
}
