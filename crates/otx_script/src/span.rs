use serde::{Deserialize, Serialize};

/// Source location of a statement inside a clause body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub file: String,
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub col: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// Maps the lexer's char offsets to byte offsets and 1-based line/column.
#[derive(Debug)]
pub(crate) struct LineIndex {
    /// Char offset of each line start.
    starts: Vec<usize>,
    /// Byte offset of every char, plus one entry for the end of input.
    bytes: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let mut starts = vec![0];
        let mut bytes = Vec::with_capacity(source.len() + 1);
        for (idx, (byte, ch)) in source.char_indices().enumerate() {
            bytes.push(byte);
            if ch == '\n' {
                starts.push(idx + 1);
            }
        }
        bytes.push(source.len());
        Self { starts, bytes }
    }

    /// Byte offset of a char offset. Offsets past the end clamp to the
    /// source length.
    pub(crate) fn byte_offset(&self, offset: usize) -> usize {
        self.bytes
            .get(offset)
            .or_else(|| self.bytes.last())
            .copied()
            .unwrap_or(0)
    }

    /// Line and column of a char offset; the column counts chars.
    pub(crate) fn line_col(&self, offset: usize) -> (u32, u32) {
        let lo = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert.saturating_sub(1),
        };
        let line = lo as u32 + 1;
        let col = (offset - self.starts[lo]) as u32 + 1;
        (line, col)
    }

    /// `Span` with a byte range for a char range from the lexer.
    pub(crate) fn span(&self, file: &str, chars: std::ops::Range<usize>) -> Span {
        let (line, col) = self.line_col(chars.start);
        Span {
            file: file.to_string(),
            start: self.byte_offset(chars.start),
            end: self.byte_offset(chars.end),
            line,
            col,
        }
    }
}
