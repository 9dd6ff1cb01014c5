//! Chunk store buffer objects.
//!
//! A [`ChunkBuffer`] is one contiguous byte run plus its line-start table.
//! Buffer index 0 in a tree is the sole mutable *change buffer*, which grows
//! only at its tail; every other buffer is an immutable *original buffer*
//! delivered by the builder or created by a large insert.

use crate::buffer::BufferCursor;
use crate::scan::line_starts_fast;

/// One byte buffer plus its line-start table.
///
/// Invariants: `line_starts` is non-decreasing, `line_starts[0] == 0`, and
/// every entry lies within `[0, buffer.len()]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkBuffer {
    pub(crate) buffer: String,
    pub(crate) line_starts: Vec<usize>,
}

impl ChunkBuffer {
    /// Wrap a buffer with a precomputed line-start table.
    pub(crate) fn new(buffer: String, line_starts: Vec<usize>) -> Self {
        Self {
            buffer,
            line_starts,
        }
    }

    /// Wrap a buffer, scanning it for line starts.
    pub(crate) fn from_text(buffer: String) -> Self {
        let line_starts = line_starts_fast(&buffer);
        Self {
            buffer,
            line_starts,
        }
    }

    /// An empty change buffer.
    pub(crate) fn empty() -> Self {
        Self {
            buffer: String::new(),
            line_starts: vec![0],
        }
    }

    /// Append `text` at the tail (change buffer only), extending the
    /// line-start table with a single-pass scan of the new bytes. Returns
    /// the offset the appended text starts at.
    pub(crate) fn append(&mut self, text: &str) -> usize {
        let prior = self.buffer.len();
        self.buffer.push_str(text);
        let mut added = line_starts_fast(text);
        for ls in &mut added {
            *ls += prior;
        }
        self.line_starts.extend_from_slice(&added[1..]);
        prior
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Absolute byte offset of a cursor in this buffer.
    pub(crate) fn offset_of(&self, cursor: BufferCursor) -> usize {
        self.line_starts[cursor.line] + cursor.column
    }

    /// Cursor at the tail of this buffer.
    pub(crate) fn end_cursor(&self) -> BufferCursor {
        let line = self.line_starts.len() - 1;
        BufferCursor {
            line,
            column: self.buffer.len() - self.line_starts[line],
        }
    }

    /// Cursor for `offset`, searching only lines `lo_line..=hi_line`.
    ///
    /// Binary search over the line-start table; the bounds let a piece
    /// restrict the search to its own window.
    pub(crate) fn cursor_for_offset_in(
        &self,
        offset: usize,
        lo_line: usize,
        hi_line: usize,
    ) -> BufferCursor {
        let mut low = lo_line;
        let mut high = hi_line;
        let mut mid = low;
        let mut mid_start = self.line_starts[mid];

        while low <= high {
            mid = low + (high - low) / 2;
            mid_start = self.line_starts[mid];

            if mid == high {
                break;
            }

            let mid_stop = self.line_starts[mid + 1];
            if offset < mid_start {
                high = mid - 1;
            } else if offset >= mid_stop {
                low = mid + 1;
            } else {
                break;
            }
        }

        BufferCursor {
            line: mid,
            column: offset - mid_start,
        }
    }
}
