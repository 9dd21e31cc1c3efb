//! Line-start table for converting between `(line, column)` positions and
//! absolute byte offsets.

extern crate alloc;

use alloc::vec::Vec;

/// Position reported by a tokenizer: 1-based line, 0-based byte column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextPosition {
    /// 1-based line number.
    pub line: usize,
    /// 0-based byte column within the line.
    pub column: usize,
}

impl TextPosition {
    /// Construct a position.
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Byte offset of the start of every line, built once per input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Scan `text` once for `\n` line breaks.
    pub fn new(text: &str) -> Self {
        let mut starts = Vec::with_capacity(text.len() / 64 + 1);
        starts.push(0);
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            starts,
            len: text.len(),
        }
    }

    /// Number of lines (a trailing newline starts an empty final line).
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Absolute offset of `pos`, or `None` when it lies outside the text.
    pub fn offset(&self, pos: TextPosition) -> Option<usize> {
        let start = *self.starts.get(pos.line.checked_sub(1)?)?;
        let offset = start.checked_add(pos.column)?;
        (offset <= self.len).then_some(offset)
    }

    /// Line/column of an absolute offset (clamped to the end of the text).
    pub fn position(&self, offset: usize) -> TextPosition {
        let offset = offset.min(self.len);
        let line = self.starts.partition_point(|start| *start <= offset);
        let start = self.starts[line - 1];
        TextPosition::new(line, offset - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_line_starts() {
        let text = "ab\ncde\n\nf";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.offset(TextPosition::new(1, 0)), Some(0));
        assert_eq!(index.offset(TextPosition::new(2, 1)), Some(4));
        assert_eq!(index.offset(TextPosition::new(3, 0)), Some(7));
        assert_eq!(index.offset(TextPosition::new(4, 0)), Some(8));
        assert_eq!(&text[8..], "f");
    }

    #[test]
    fn offset_rejects_out_of_range_positions() {
        let index = LineIndex::new("one\ntwo");
        assert_eq!(index.offset(TextPosition::new(0, 0)), None);
        assert_eq!(index.offset(TextPosition::new(3, 0)), None);
        assert_eq!(index.offset(TextPosition::new(2, 9)), None);
    }

    #[test]
    fn position_inverts_offset() {
        let text = "<p>\n  <img src=x>\n</p>\n";
        let index = LineIndex::new(text);
        for offset in 0..=text.len() {
            let pos = index.position(offset);
            assert_eq!(index.offset(pos), Some(offset), "offset {}", offset);
        }
        assert_eq!(index.position(6), TextPosition::new(2, 2));
    }

    #[test]
    fn empty_text_has_one_line() {
        let index = LineIndex::new("");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.position(10), TextPosition::new(1, 0));
    }
}
