//! The piece tree text buffer.
//!
//! A [`TextBuffer`] stores a document as an ordered set of immutable byte
//! buffers (the original file chunks plus one append-only change buffer) and
//! a red-black tree of *pieces*, each naming a byte window in one buffer.
//! The tree is keyed by document position through two per-node aggregates —
//! bytes and line feeds in the left subtree — which give O(log n) edits,
//! offset↔position conversion, and line retrieval.
//!
//! Buffers are only ever appended to; deleting never shrinks a buffer, only
//! the tree that indexes it. A single instance is single-writer: wrap it in
//! external synchronization if you need concurrent access.

mod cache;
mod edit;
mod node;
mod query;
mod rb;
mod snapshot;

pub use node::{BufferCursor, Piece, Position};
pub use snapshot::Snapshot;

use tracing::debug;

use crate::builder::EndOfLine;
use crate::chunk::ChunkBuffer;
use crate::error::{Error, Result};
use crate::scan::{lossy_to_string, replace_line_endings};
use cache::{CacheEntry, LineCache, SearchCache};
use node::{Color, Node, NodeArena, NodeId, NodePosition};

/// Target size for freshly created buffers. Inserts smaller than this append
/// to the change buffer; larger ones are chopped into blocks of at most this
/// many bytes, each becoming its own buffer.
pub(crate) const AVERAGE_BUFFER_SIZE: usize = 64 * 1024;

/// Search cache capacity.
const SEARCH_CACHE_LIMIT: usize = 1;

/// Piece-tree text buffer.
///
/// Construct one through [`TextBufferBuilder`](crate::TextBufferBuilder);
/// offsets are byte offsets, positions are 1-based `(line, column)` pairs
/// with byte columns. Out-of-range coordinates are clamped, never fatal.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    pub(crate) nodes: NodeArena,
    pub(crate) root: NodeId,
    /// Index 0 is the change buffer; the rest are immutable.
    pub(crate) buffers: Vec<ChunkBuffer>,
    pub(crate) length: usize,
    pub(crate) line_count: usize,
    pub(crate) eol: EndOfLine,
    pub(crate) eol_normalized: bool,
    /// Cursor at the logical tail of the change buffer; the insert hot path
    /// compares against it to detect contiguous appends.
    pub(crate) last_change_buffer_pos: BufferCursor,
    pub(crate) search_cache: SearchCache,
    pub(crate) line_cache: LineCache,
}

impl TextBuffer {
    /// Build a tree over `chunks`, one full-buffer piece per non-empty chunk.
    pub(crate) fn from_chunks(
        chunks: Vec<ChunkBuffer>,
        eol: EndOfLine,
        eol_normalized: bool,
    ) -> Self {
        let mut buf = Self {
            nodes: NodeArena::new(),
            root: NodeId::NIL,
            buffers: vec![ChunkBuffer::empty()],
            length: 0,
            line_count: 1,
            eol,
            eol_normalized,
            last_change_buffer_pos: BufferCursor::default(),
            search_cache: SearchCache::new(SEARCH_CACHE_LIMIT),
            line_cache: LineCache::new(),
        };

        let mut last = NodeId::NIL;
        for chunk in chunks {
            if chunk.len() == 0 {
                continue;
            }
            let piece = Piece::new(
                buf.buffers.len(),
                BufferCursor::new(0, 0),
                chunk.end_cursor(),
                chunk.line_starts.len() - 1,
                chunk.len(),
            );
            buf.buffers.push(chunk);
            last = buf.rb_insert_right(last, piece);
        }

        buf.compute_buffer_metadata();
        buf
    }

    /// Document length in bytes. O(1).
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Is the document empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of lines (always at least 1). O(1).
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// The active line terminator.
    #[must_use]
    pub fn eol(&self) -> EndOfLine {
        self.eol
    }

    /// True when every terminator in the document matches [`eol`](Self::eol).
    #[must_use]
    pub fn is_eol_normalized(&self) -> bool {
        self.eol_normalized
    }

    /// Number of pieces the document is currently split into.
    #[must_use]
    pub fn piece_count(&self) -> usize {
        self.collect_inorder().len()
    }

    /// Switch the active terminator, rewriting every terminator in the
    /// document to match. After this returns the buffer is normalized.
    pub fn set_eol(&mut self, eol: EndOfLine) {
        self.eol = eol;
        self.normalize_eol(eol);
    }

    /// Rebuild the document with every terminator rewritten to `eol`.
    ///
    /// Content is re-chunked to keep buffers near the target size before the
    /// tree is rebuilt from scratch.
    fn normalize_eol(&mut self, eol: EndOfLine) {
        let min = AVERAGE_BUFFER_SIZE - AVERAGE_BUFFER_SIZE / 3;
        let max = min * 2;

        debug!(eol = eol.as_str(), length = self.length, "normalizing line endings");

        let mut chunks: Vec<ChunkBuffer> = Vec::new();
        let mut pending: Vec<u8> = Vec::new();

        for id in self.collect_inorder() {
            let bytes = self.node_bytes(id);
            if pending.len() <= min || pending.len() + bytes.len() < max {
                pending.extend_from_slice(bytes);
                continue;
            }
            let text = replace_line_endings(&lossy_to_string(&pending), eol.as_str());
            chunks.push(ChunkBuffer::from_text(text));
            pending.clear();
            pending.extend_from_slice(bytes);
        }
        if !pending.is_empty() {
            let text = replace_line_endings(&lossy_to_string(&pending), eol.as_str());
            chunks.push(ChunkBuffer::from_text(text));
        }

        *self = Self::from_chunks(chunks, eol, true);
    }

    // ------------------------------------------------------------------
    // Node and buffer plumbing
    // ------------------------------------------------------------------

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(id)
    }

    /// Absolute offset of `cursor` inside buffer `buffer_index`.
    pub(crate) fn offset_in_buffer(&self, buffer_index: usize, cursor: BufferCursor) -> usize {
        self.buffers[buffer_index].offset_of(cursor)
    }

    /// The byte window a piece describes.
    pub(crate) fn piece_bytes(&self, piece: Piece) -> &[u8] {
        let chunk = &self.buffers[piece.buffer_index];
        let start = chunk.offset_of(piece.start);
        let end = chunk.offset_of(piece.end);
        chunk.bytes().get(start..end).unwrap_or(&[])
    }

    /// The byte window of a node's piece (empty for the sentinel).
    pub(crate) fn node_bytes(&self, id: NodeId) -> &[u8] {
        if id.is_nil() {
            return &[];
        }
        self.piece_bytes(self.node(id).piece)
    }

    /// Cursor for byte `remainder` within `node`'s piece.
    pub(crate) fn position_in_buffer(&self, node: NodeId, remainder: usize) -> BufferCursor {
        let piece = self.node(node).piece;
        let chunk = &self.buffers[piece.buffer_index];
        let start_offset = chunk.offset_of(piece.start);
        chunk.cursor_for_offset_in(start_offset + remainder, piece.start.line, piece.end.line)
    }

    /// CRLF-aware terminator count within `[start, end)` of one buffer.
    ///
    /// A `\r` at the window's tail counts even when its `\n` lies outside:
    /// the window still ends a line there.
    pub(crate) fn line_feed_count_in(
        &self,
        buffer_index: usize,
        start: BufferCursor,
        end: BufferCursor,
    ) -> usize {
        if start.line == end.line && start.column == end.column {
            return 0;
        }
        if end.column == 0 {
            return end.line - start.line;
        }

        let chunk = &self.buffers[buffer_index];
        if end.line == chunk.line_starts.len() - 1 {
            // No terminator after `end`, or there would be another line start.
            return end.line - start.line;
        }

        let next_line_start = chunk.line_starts[end.line + 1];
        let end_offset = chunk.line_starts[end.line] + end.column;
        if next_line_start > end_offset + 1 {
            return end.line - start.line;
        }

        // The byte at end_offset is a terminator; end.column > 0 rules out a
        // lone \r there, so it is the \n of a \r\n whose \r may sit inside.
        let previous = end_offset - 1;
        if chunk.bytes()[previous] == b'\r' {
            end.line - start.line + 1
        } else {
            end.line - start.line
        }
    }

    /// Byte count from the piece start of `node` through the end of its
    /// `index`-th contained line (piece end if `index` runs past them).
    pub(crate) fn accumulated_value(&self, node: NodeId, index: isize) -> usize {
        if index < 0 {
            return 0;
        }
        let piece = self.node(node).piece;
        let line_starts = &self.buffers[piece.buffer_index].line_starts;
        let expected = piece.start.line + index as usize + 1;
        let base = line_starts[piece.start.line] + piece.start.column;
        if expected > piece.end.line {
            line_starts[piece.end.line] + piece.end.column - base
        } else {
            line_starts[expected] - base
        }
    }

    /// Document offset at which `node` starts. O(log n).
    pub(crate) fn offset_of_node(&self, node: NodeId) -> usize {
        if node.is_nil() {
            return 0;
        }
        let mut pos = self.node(node).size_left;
        let mut current = node;
        while current != self.root {
            let parent = self.node(current).parent;
            if self.node(parent).right == current {
                pos += self.node(parent).size_left + self.node(parent).piece.length;
            }
            current = parent;
        }
        pos
    }

    /// Locate the node holding byte `offset`, consulting the search cache.
    ///
    /// Offsets past the end settle on the last node with its full length as
    /// remainder. Containment is strict: an offset at a node boundary
    /// belongs to the following node.
    pub(crate) fn node_at(&mut self, mut offset: usize) -> NodePosition {
        if let Some(entry) = self.search_cache.get(offset, &self.nodes) {
            return NodePosition {
                node: entry.node,
                remainder: offset - entry.node_start_offset,
                node_start_offset: entry.node_start_offset,
            };
        }

        let mut x = self.root;
        let mut node_start_offset = 0;

        while !x.is_nil() {
            let (size_left, length, left, right) = {
                let n = self.node(x);
                (n.size_left, n.piece.length, n.left, n.right)
            };
            if size_left > offset {
                x = left;
            } else if size_left + length > offset {
                node_start_offset += size_left;
                let stamp = self.node(x).stamp;
                self.search_cache.set(CacheEntry {
                    node: x,
                    stamp,
                    node_start_offset,
                    node_start_line: None,
                });
                return NodePosition {
                    node: x,
                    remainder: offset - size_left,
                    node_start_offset,
                };
            } else {
                offset -= size_left + length;
                node_start_offset += size_left + length;
                x = right;
            }
        }

        if self.root.is_nil() {
            return NodePosition {
                node: NodeId::NIL,
                remainder: 0,
                node_start_offset: 0,
            };
        }
        let last = self.nodes.rightmost(self.root);
        NodePosition {
            node: last,
            remainder: self.node(last).piece.length,
            node_start_offset: self.offset_of_node(last),
        }
    }

    /// Locate the node holding `(line, column)` (both 1-based).
    ///
    /// Callers clamp `line` into `1..=line_count` first. When the addressed
    /// line continues into later pieces, the walk follows in-order
    /// successors until the column is consumed.
    pub(crate) fn node_at_line(&self, mut line: usize, mut column: usize) -> NodePosition {
        let mut x = self.root;
        let mut node_start_offset = 0;

        while !x.is_nil() {
            let (lf_left, lf_count, size_left, length, left, right) = {
                let n = self.node(x);
                (
                    n.lf_left,
                    n.piece.line_feed_count,
                    n.size_left,
                    n.piece.length,
                    n.left,
                    n.right,
                )
            };

            if !left.is_nil() && lf_left >= line - 1 {
                x = left;
            } else if lf_left + lf_count > line - 1 {
                let prev_acc = self.accumulated_value(x, line as isize - lf_left as isize - 2);
                let acc = self.accumulated_value(x, line as isize - lf_left as isize - 1);
                node_start_offset += size_left;
                return NodePosition {
                    node: x,
                    remainder: (prev_acc + column - 1).min(acc),
                    node_start_offset,
                };
            } else if lf_left + lf_count == line - 1 {
                let prev_acc = self.accumulated_value(x, line as isize - lf_left as isize - 2);
                if prev_acc + column - 1 <= length {
                    return NodePosition {
                        node: x,
                        remainder: prev_acc + column - 1,
                        node_start_offset: node_start_offset + size_left,
                    };
                }
                column -= length - prev_acc;
                break;
            } else {
                line -= lf_left + lf_count;
                node_start_offset += size_left + length;
                x = right;
            }
        }

        if x.is_nil() {
            return NodePosition {
                node: NodeId::NIL,
                remainder: 0,
                node_start_offset: 0,
            };
        }

        // The target column continues past x; walk forward until a piece
        // with a terminator (line ends there) or the column is consumed.
        let mut x = self.nodes.next(x);
        while !x.is_nil() {
            let (lf_count, length) = {
                let n = self.node(x);
                (n.piece.line_feed_count, n.piece.length)
            };
            if lf_count > 0 {
                let acc = self.accumulated_value(x, 0);
                return NodePosition {
                    node: x,
                    remainder: (column - 1).min(acc),
                    node_start_offset: self.offset_of_node(x),
                };
            }
            if length >= column - 1 {
                return NodePosition {
                    node: x,
                    remainder: column - 1,
                    node_start_offset: self.offset_of_node(x),
                };
            }
            column -= length;
            x = self.nodes.next(x);
        }

        NodePosition {
            node: NodeId::NIL,
            remainder: 0,
            node_start_offset: 0,
        }
    }

    // ------------------------------------------------------------------
    // CRLF predicates
    // ------------------------------------------------------------------

    /// CRLF repair can be skipped entirely for an LF-normalized buffer.
    pub(crate) fn should_check_crlf(&self) -> bool {
        !(self.eol_normalized && self.eol == EndOfLine::Lf)
    }

    /// Byte at `offset` within `node`'s piece, for terminator probing.
    ///
    /// `None` when the piece holds no terminators at all (nothing to probe)
    /// or the offset runs off the buffer.
    pub(crate) fn node_char_code(&self, node: NodeId, offset: usize) -> Option<u8> {
        let piece = self.node(node).piece;
        if piece.line_feed_count < 1 {
            return None;
        }
        let chunk = &self.buffers[piece.buffer_index];
        let at = chunk.offset_of(piece.start) + offset;
        chunk.bytes().get(at).copied()
    }

    /// Does `node`'s piece begin with a line feed?
    pub(crate) fn node_starts_with_lf(&self, node: NodeId) -> bool {
        if node.is_nil() || self.node(node).piece.line_feed_count == 0 {
            return false;
        }
        let piece = self.node(node).piece;
        let chunk = &self.buffers[piece.buffer_index];
        let line = piece.start.line;
        let start_offset = chunk.line_starts[line] + piece.start.column;
        if line == chunk.line_starts.len() - 1 {
            // Start sits on the last buffer line: no terminator after it.
            return false;
        }
        if chunk.line_starts[line + 1] > start_offset + 1 {
            return false;
        }
        chunk.bytes()[start_offset] == b'\n'
    }

    /// Does `node`'s piece end with a carriage return?
    pub(crate) fn node_ends_with_cr(&self, node: NodeId) -> bool {
        if node.is_nil() || self.node(node).piece.line_feed_count == 0 {
            return false;
        }
        let length = self.node(node).piece.length;
        self.node_char_code(node, length - 1) == Some(b'\r')
    }

    // ------------------------------------------------------------------
    // Document bookkeeping
    // ------------------------------------------------------------------

    /// Refresh `length`/`line_count` from the root's right spine and expire
    /// cache entries past the new end.
    pub(crate) fn compute_buffer_metadata(&mut self) {
        let mut x = self.root;
        let mut line_count = 1;
        let mut length = 0;
        while !x.is_nil() {
            let n = self.node(x);
            line_count += n.lf_left + n.piece.line_feed_count;
            length += n.size_left + n.piece.length;
            x = n.right;
        }
        self.line_count = line_count;
        self.length = length;
        self.search_cache.invalidate(length, &self.nodes);
    }

    /// Direct in-order sums of piece lengths and line feeds.
    pub(crate) fn direct_sums(&self) -> (usize, usize) {
        let mut length = 0;
        let mut line_feeds = 0;
        for id in self.collect_inorder() {
            let piece = self.node(id).piece;
            length += piece.length;
            line_feeds += piece.line_feed_count;
        }
        (length, line_feeds)
    }

    /// In-order node ids, left to right.
    pub(crate) fn collect_inorder(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        let mut current = self.root;
        while !current.is_nil() || !stack.is_empty() {
            while !current.is_nil() {
                stack.push(current);
                current = self.node(current).left;
            }
            let id = stack.pop().expect("stack non-empty by loop condition");
            out.push(id);
            current = self.node(id).right;
        }
        out
    }

    /// Full document bytes, in order.
    pub(crate) fn content_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length);
        for id in self.collect_inorder() {
            out.extend_from_slice(self.node_bytes(id));
        }
        out
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Verify every structural invariant: red-black colour rules, black
    /// height, aggregate accuracy, piece windows, and the document counts.
    ///
    /// Mutating operations run this under `debug_assert!`; release builds
    /// may call it explicitly after suspicious states.
    pub fn check_invariants(&self) -> Result<()> {
        if !self.nodes.sentinel_ok() {
            return Err(Error::SentinelCorrupted);
        }
        if !self.root.is_nil() && self.node(self.root).color == Color::Red {
            return Err(Error::RedViolation);
        }

        let (size, line_feeds, _) = self.validate_subtree(self.root)?;

        if self.length != size {
            return Err(Error::LengthMismatch {
                recorded: self.length,
                actual: size,
            });
        }
        if self.line_count != 1 + line_feeds {
            return Err(Error::LineCountMismatch {
                recorded: self.line_count,
                actual: 1 + line_feeds,
            });
        }
        Ok(())
    }

    /// Returns (byte size, line feeds, black height) of the subtree.
    fn validate_subtree(&self, id: NodeId) -> Result<(usize, usize, usize)> {
        if id.is_nil() {
            return Ok((0, 0, 1));
        }
        let n = self.node(id);
        let piece = n.piece;

        let chunk = &self.buffers[piece.buffer_index];
        let start = chunk.offset_of(piece.start);
        let end = chunk.offset_of(piece.end);
        if start > end || end > chunk.len() {
            return Err(Error::PieceOutOfBounds {
                buffer_index: piece.buffer_index,
                start,
                end,
                buffer_len: chunk.len(),
            });
        }
        if end - start != piece.length {
            return Err(Error::PieceLengthMismatch {
                recorded: piece.length,
                actual: end - start,
            });
        }

        if n.color == Color::Red
            && (self.node(n.left).color == Color::Red || self.node(n.right).color == Color::Red)
        {
            return Err(Error::RedViolation);
        }

        let (left_size, left_lf, left_bh) = self.validate_subtree(n.left)?;
        let (right_size, right_lf, right_bh) = self.validate_subtree(n.right)?;

        if left_bh != right_bh {
            return Err(Error::BlackHeightMismatch {
                left: left_bh,
                right: right_bh,
            });
        }
        if n.size_left != left_size || n.lf_left != left_lf {
            return Err(Error::AggregateMismatch {
                size_left: n.size_left,
                actual_size: left_size,
                lf_left: n.lf_left,
                actual_lf: left_lf,
            });
        }

        let black = usize::from(n.color == Color::Black);
        Ok((
            left_size + piece.length + right_size,
            left_lf + piece.line_feed_count + right_lf,
            left_bh + black,
        ))
    }
}

impl PartialEq for TextBuffer {
    /// Structural equality: same length, same line count, same bytes.
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self.line_count == other.line_count
            && self.content_bytes() == other.content_bytes()
    }
}

impl Eq for TextBuffer {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TextBufferBuilder;

    fn build(text: &str) -> TextBuffer {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk(text);
        builder.finish(false).create(EndOfLine::Lf)
    }

    #[test]
    fn test_from_chunks_skips_empty() {
        let buf = TextBuffer::from_chunks(
            vec![
                ChunkBuffer::from_text("ab".to_string()),
                ChunkBuffer::from_text(String::new()),
                ChunkBuffer::from_text("cd".to_string()),
            ],
            EndOfLine::Lf,
            false,
        );
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.piece_count(), 2);
        buf.check_invariants().unwrap();
    }

    #[test]
    fn test_line_feed_count_window() {
        let buf = build("ab\ncd\r\nef");
        // Whole first piece: two terminators.
        let root = buf.collect_inorder()[0];
        let piece = buf.node(root).piece;
        assert_eq!(
            buf.line_feed_count_in(piece.buffer_index, piece.start, piece.end),
            2
        );
        // Window ending between \r and \n still counts the \r.
        let cr_end = buf.position_in_buffer(root, 6);
        assert_eq!(
            buf.line_feed_count_in(piece.buffer_index, piece.start, cr_end),
            2
        );
    }

    #[test]
    fn test_offset_of_node_matches_walk() {
        let mut buf = build("one\ntwo\nthree");
        buf.insert(4, "1", false);
        buf.insert(9, "2", false);
        let mut expected = 0;
        for id in buf.collect_inorder() {
            assert_eq!(buf.offset_of_node(id), expected);
            expected += buf.node(id).piece.length;
        }
    }

    #[test]
    fn test_node_at_strict_boundary() {
        let mut buf = build("abc");
        buf.insert(3, "def", false);
        assert_eq!(buf.piece_count(), 2);
        // Offset 3 sits at the seam: strict containment puts it in the
        // second node, remainder 0.
        let pos = buf.node_at(3);
        assert_eq!(pos.remainder, 0);
        assert_eq!(pos.node_start_offset, 3);
    }

    #[test]
    fn test_node_at_past_end() {
        let mut buf = build("abc");
        let pos = buf.node_at(99);
        assert_eq!(pos.remainder, 3);
        assert_eq!(pos.node_start_offset, 0);
    }

    #[test]
    fn test_set_eol_normalizes() {
        let mut buf = build("a\r\nb\rc\nd");
        buf.set_eol(EndOfLine::Crlf);
        assert!(buf.is_eol_normalized());
        assert_eq!(buf.lines_raw_content(), "a\r\nb\r\nc\r\nd");
        assert_eq!(buf.line_count(), 4);
        buf.check_invariants().unwrap();

        buf.set_eol(EndOfLine::Lf);
        assert_eq!(buf.lines_raw_content(), "a\nb\nc\nd");
        assert_eq!(buf.line_count(), 4);
    }

    #[test]
    fn test_equality_by_content() {
        let a = build("same text\nhere");
        let b = build("same text\nhere");
        let c = build("different");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invariants_catch_corruption() {
        let mut buf = build("hello\nworld");
        buf.check_invariants().unwrap();
        buf.length += 1;
        assert!(matches!(
            buf.check_invariants(),
            Err(Error::LengthMismatch { .. })
        ));
    }
}
