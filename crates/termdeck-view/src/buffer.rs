//! Line-oriented scrollback buffer with soft-wrap tracking.

use std::collections::VecDeque;

/// One physical row of the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferLine {
    /// Printed characters interleaved with preserved SGR sequences
    text: String,
    /// Byte offset of each printed character in `text`
    char_offsets: Vec<usize>,
    /// Row continues the previous one
    wrapped: bool,
}

impl BufferLine {
    fn continuation() -> Self {
        Self {
            wrapped: true,
            ..Self::default()
        }
    }

    /// Row text including ANSI sequences.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of printed cells.
    pub fn width(&self) -> usize {
        self.char_offsets.len()
    }

    /// Whether this row is a soft-wrap continuation.
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Printed characters only, sequences stripped.
    pub fn plain_text(&self) -> String {
        self.char_offsets
            .iter()
            .filter_map(|&offset| self.text[offset..].chars().next())
            .collect()
    }
}

/// Terminal history as physical rows.
///
/// There is no cursor addressing: output is appended to the last row, which
/// wraps onto a continuation row once it holds `cols` cells.
#[derive(Debug, Clone)]
pub struct ScrollbackBuffer {
    lines: VecDeque<BufferLine>,
    cols: u16,
    limit: usize,
}

impl ScrollbackBuffer {
    /// Create an empty buffer wrapping at `cols` and retaining at most `limit` rows.
    pub fn new(cols: u16, limit: usize) -> Self {
        let mut lines = VecDeque::new();
        lines.push_back(BufferLine::default());
        Self {
            lines,
            cols: cols.max(1),
            limit: limit.max(1),
        }
    }

    /// Wrap width.
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Change the wrap width. Existing rows are not reflowed.
    pub fn set_cols(&mut self, cols: u16) {
        self.cols = cols.max(1);
    }

    /// Number of physical rows.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the buffer holds nothing but an empty row.
    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].text.is_empty()
    }

    /// Row at `index`.
    pub fn line(&self, index: usize) -> Option<&BufferLine> {
        self.lines.get(index)
    }

    fn current(&mut self) -> &mut BufferLine {
        if self.lines.is_empty() {
            self.lines.push_back(BufferLine::default());
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn start_line(&mut self, line: BufferLine) {
        self.lines.push_back(line);
        while self.lines.len() > self.limit {
            self.lines.pop_front();
        }
        // The head of an evicted logical line is gone; the survivor starts fresh.
        if let Some(first) = self.lines.front_mut() {
            first.wrapped = false;
        }
    }

    /// Print one character, wrapping first if the row is full.
    pub fn push_char(&mut self, c: char) {
        let cols = self.cols as usize;
        if self.current().width() >= cols {
            self.start_line(BufferLine::continuation());
        }
        let line = self.current();
        line.char_offsets.push(line.text.len());
        line.text.push(c);
    }

    /// Append a zero-width escape sequence to the current row.
    pub fn push_sequence(&mut self, sequence: &str) {
        self.current().text.push_str(sequence);
    }

    /// Hard line break.
    pub fn newline(&mut self) {
        self.start_line(BufferLine::default());
    }

    /// Erase the last printed character of the current row.
    pub fn backspace(&mut self) {
        let line = self.current();
        if let Some(offset) = line.char_offsets.pop() {
            line.text.remove(offset);
        }
    }

    /// Advance to the next tab stop (every 8 cells), clamped to the row width.
    pub fn tab(&mut self) {
        let cols = self.cols as usize;
        let width = self.current().width();
        if width >= cols {
            return;
        }
        let next_stop = ((width / 8) + 1) * 8;
        for _ in width..next_stop.min(cols) {
            self.push_char(' ');
        }
    }

    /// Drop all rows.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.lines.push_back(BufferLine::default());
    }

    /// The last `max_lines` rows, one per line, sequences preserved.
    pub fn serialize(&self, max_lines: usize) -> String {
        let start = self.lines.len().saturating_sub(max_lines);
        self.lines
            .iter()
            .skip(start)
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All rows as plain text, one per line.
    pub fn to_plain_text(&self) -> String {
        self.lines
            .iter()
            .map(BufferLine::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_str(buffer: &mut ScrollbackBuffer, text: &str) {
        for c in text.chars() {
            buffer.push_char(c);
        }
    }

    #[test]
    fn test_buffer_new() {
        let buffer = ScrollbackBuffer::new(80, 100);
        assert_eq!(buffer.len(), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.cols(), 80);
    }

    #[test]
    fn test_wrap_marks_continuation() {
        let mut buffer = ScrollbackBuffer::new(4, 100);
        push_str(&mut buffer, "abcdefghij");

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.line(0).unwrap().text(), "abcd");
        assert!(!buffer.line(0).unwrap().is_wrapped());
        assert_eq!(buffer.line(1).unwrap().text(), "efgh");
        assert!(buffer.line(1).unwrap().is_wrapped());
        assert_eq!(buffer.line(2).unwrap().text(), "ij");
        assert!(buffer.line(2).unwrap().is_wrapped());
    }

    #[test]
    fn test_exact_width_then_newline_does_not_wrap() {
        let mut buffer = ScrollbackBuffer::new(4, 100);
        push_str(&mut buffer, "abcd");
        buffer.newline();
        push_str(&mut buffer, "e");

        assert_eq!(buffer.len(), 2);
        assert!(!buffer.line(1).unwrap().is_wrapped());
    }

    #[test]
    fn test_sequences_are_zero_width() {
        let mut buffer = ScrollbackBuffer::new(3, 100);
        buffer.push_sequence("\x1b[31m");
        push_str(&mut buffer, "abc");
        buffer.push_sequence("\x1b[0m");

        assert_eq!(buffer.len(), 1);
        let line = buffer.line(0).unwrap();
        assert_eq!(line.text(), "\x1b[31mabc\x1b[0m");
        assert_eq!(line.width(), 3);
        assert_eq!(line.plain_text(), "abc");
    }

    #[test]
    fn test_backspace_skips_sequences() {
        let mut buffer = ScrollbackBuffer::new(80, 100);
        push_str(&mut buffer, "ab");
        buffer.push_sequence("\x1b[1m");
        buffer.backspace();

        let line = buffer.line(0).unwrap();
        assert_eq!(line.text(), "a\x1b[1m");
        assert_eq!(line.width(), 1);
    }

    #[test]
    fn test_tab_stops() {
        let mut buffer = ScrollbackBuffer::new(80, 100);
        push_str(&mut buffer, "ab");
        buffer.tab();
        assert_eq!(buffer.line(0).unwrap().width(), 8);
    }

    #[test]
    fn test_limit_evicts_oldest_and_unwraps_head() {
        let mut buffer = ScrollbackBuffer::new(2, 3);
        push_str(&mut buffer, "aabbccdd");

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.line(0).unwrap().text(), "bb");
        assert!(!buffer.line(0).unwrap().is_wrapped());
        assert!(buffer.line(1).unwrap().is_wrapped());
    }

    #[test]
    fn test_serialize_tail() {
        let mut buffer = ScrollbackBuffer::new(80, 100);
        for line in ["one", "two", "three"] {
            push_str(&mut buffer, line);
            buffer.newline();
        }

        assert_eq!(buffer.serialize(2), "three\n");
        assert_eq!(buffer.serialize(10), "one\ntwo\nthree\n");
    }

    #[test]
    fn test_clear() {
        let mut buffer = ScrollbackBuffer::new(80, 100);
        push_str(&mut buffer, "data");
        buffer.newline();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.to_plain_text(), "");
    }
}
