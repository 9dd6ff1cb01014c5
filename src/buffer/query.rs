//! Query engine: offsets, positions, lines, ranges, and snapshots.
//!
//! All coordinates are clamped rather than rejected; reads outside the
//! document come back empty. Line numbers and columns are 1-based, offsets
//! and columns count bytes.

use crate::buffer::cache::CacheEntry;
use crate::buffer::node::{NodeId, NodePosition, Position};
use crate::buffer::{Snapshot, TextBuffer};
use crate::scan::{lossy_to_string, replace_line_endings, split_lines};

impl TextBuffer {
    /// Byte offset of `(line, column)`, clamped to the document.
    #[must_use]
    pub fn offset_at(&self, line: usize, column: usize) -> usize {
        let mut line = line.clamp(1, self.line_count);
        let column = column.max(1);

        let mut left_len = 0;
        let mut x = self.root;

        while !x.is_nil() {
            let (left, right, size_left, lf_left, lf_count, length) = {
                let n = self.node(x);
                (
                    n.left,
                    n.right,
                    n.size_left,
                    n.lf_left,
                    n.piece.line_feed_count,
                    n.piece.length,
                )
            };

            if !left.is_nil() && lf_left + 1 >= line {
                x = left;
            } else if lf_left + lf_count + 1 >= line {
                left_len += size_left;
                let acc = self.accumulated_value(x, line as isize - lf_left as isize - 2);
                return (left_len + acc + column - 1).min(self.length);
            } else {
                line -= lf_left + lf_count;
                left_len += size_left + length;
                x = right;
            }
        }

        left_len.min(self.length)
    }

    /// Position of byte `offset`, clamped to the document.
    #[must_use]
    pub fn position_at(&self, offset: usize) -> Position {
        let original_offset = offset.min(self.length);
        let mut offset = original_offset;

        let mut x = self.root;
        let mut lf_count = 0;

        while !x.is_nil() {
            let (left, right, size_left, lf_left, piece_lf, length) = {
                let n = self.node(x);
                (
                    n.left,
                    n.right,
                    n.size_left,
                    n.lf_left,
                    n.piece.line_feed_count,
                    n.piece.length,
                )
            };

            if size_left != 0 && size_left >= offset {
                x = left;
            } else if size_left + length >= offset {
                let (index, remainder) = self.index_of(x, offset - size_left);
                lf_count += lf_left + index;

                if index == 0 {
                    // The offset sits on the node's first line, which may
                    // have started in an earlier piece: derive the column
                    // from the line's document start instead.
                    let line_start = self.offset_at(lf_count + 1, 1);
                    return Position::new(lf_count + 1, original_offset - line_start + 1);
                }
                return Position::new(lf_count + 1, remainder + 1);
            } else {
                offset -= size_left + length;
                lf_count += lf_left + piece_lf;

                if right.is_nil() {
                    let line_start = self.offset_at(lf_count + 1, 1);
                    return Position::new(lf_count + 1, original_offset - offset - line_start + 1);
                }
                x = right;
            }
        }

        Position::new(1, 1)
    }

    /// Within-node line index and column of byte `accumulated`, with the
    /// CRLF correction when the byte lands exactly on the piece end.
    fn index_of(&self, node: NodeId, accumulated: usize) -> (usize, usize) {
        let piece = self.node(node).piece;
        let pos = self.position_in_buffer(node, accumulated);
        let line_index = pos.line - piece.start.line;

        let window = self.offset_in_buffer(piece.buffer_index, piece.end)
            - self.offset_in_buffer(piece.buffer_index, piece.start);
        if window == accumulated {
            // At the very end of the piece a trailing \r (whose \n lives
            // elsewhere) must still close its line.
            let real_line_count = self.line_feed_count_in(piece.buffer_index, piece.start, pos);
            if real_line_count != line_index {
                return (real_line_count, 0);
            }
        }

        (line_index, pos.column)
    }

    /// Content of `line_number` without its terminator. Cached per line;
    /// any edit clears the cache.
    pub fn line_content(&mut self, line_number: usize) -> String {
        if line_number < 1 || line_number > self.line_count {
            return String::new();
        }
        if let Some(value) = self.line_cache.get(line_number) {
            return value.to_string();
        }

        let value = if line_number == self.line_count {
            self.line_raw_content(line_number, 0)
        } else if self.eol_normalized {
            self.line_raw_content(line_number, self.eol.len())
        } else {
            let raw = self.line_raw_content(line_number, 0);
            raw.trim_end_matches(['\r', '\n']).to_string()
        };

        self.line_cache.set(line_number, value.clone());
        value
    }

    /// Raw content of `line_number`, with `trim` bytes dropped from the
    /// terminator side. The line-based search cache is consulted and fed.
    fn line_raw_content(&mut self, line_number: usize, trim: usize) -> String {
        if line_number < 1 || line_number > self.line_count {
            return String::new();
        }

        let mut out: Vec<u8> = Vec::new();
        let mut x;

        if let Some(entry) = self.search_cache.get_by_line(line_number, &self.nodes) {
            x = entry.node;
            let start_line = entry
                .node_start_line
                .expect("line hits always carry a start line");
            let seg = line_number - start_line;
            let prev_acc = self.accumulated_value(x, seg as isize - 1);
            let lf_count = self.node(x).piece.line_feed_count;

            if start_line + lf_count == line_number {
                // Last segment of the piece: the line continues rightward.
                let bytes = self.node_bytes(x);
                out.extend_from_slice(bytes.get(prev_acc..).unwrap_or(&[]));
            } else {
                let acc = self.accumulated_value(x, seg as isize);
                let bytes = self.node_bytes(x);
                let end = acc.saturating_sub(trim);
                return lossy_to_string(bytes.get(prev_acc..end).unwrap_or(&[]));
            }
        } else {
            let mut line = line_number;
            let mut node_start_offset = 0;
            x = self.root;

            loop {
                if x.is_nil() {
                    return lossy_to_string(&out);
                }
                let (left, right, size_left, lf_left, lf_count, length) = {
                    let n = self.node(x);
                    (
                        n.left,
                        n.right,
                        n.size_left,
                        n.lf_left,
                        n.piece.line_feed_count,
                        n.piece.length,
                    )
                };

                if !left.is_nil() && lf_left >= line - 1 {
                    x = left;
                } else if lf_left + lf_count > line - 1 {
                    let prev_acc =
                        self.accumulated_value(x, line as isize - lf_left as isize - 2);
                    let acc = self.accumulated_value(x, line as isize - lf_left as isize - 1);
                    node_start_offset += size_left;

                    let stamp = self.node(x).stamp;
                    self.search_cache.set(CacheEntry {
                        node: x,
                        stamp,
                        node_start_offset,
                        node_start_line: Some(line_number - (line - 1 - lf_left)),
                    });

                    let bytes = self.node_bytes(x);
                    let end = acc.saturating_sub(trim);
                    return lossy_to_string(bytes.get(prev_acc..end).unwrap_or(&[]));
                } else if lf_left + lf_count == line - 1 {
                    // The line starts in this piece and runs past its end.
                    let prev_acc =
                        self.accumulated_value(x, line as isize - lf_left as isize - 2);
                    let bytes = self.node_bytes(x);
                    out.extend_from_slice(bytes.get(prev_acc..length).unwrap_or(&[]));
                    break;
                } else {
                    line -= lf_left + lf_count;
                    node_start_offset += size_left + length;
                    x = right;
                }
            }
        }

        // Collect the rest of the line from the following pieces.
        let mut x = self.nodes.next(x);
        while !x.is_nil() {
            let lf_count = self.node(x).piece.line_feed_count;
            let length = self.node(x).piece.length;

            if lf_count > 0 {
                let acc = self.accumulated_value(x, 0);
                let bytes = self.node_bytes(x);
                let end = acc.saturating_sub(trim);
                out.extend_from_slice(bytes.get(..end).unwrap_or(&[]));
                return lossy_to_string(&out);
            }
            let bytes = self.node_bytes(x);
            out.extend_from_slice(bytes.get(..length).unwrap_or(&[]));
            x = self.nodes.next(x);
        }

        lossy_to_string(&out)
    }

    /// Length of `line_number` in bytes, excluding its terminator.
    #[must_use]
    pub fn line_length(&self, line_number: usize) -> usize {
        if line_number < 1 || line_number > self.line_count {
            return 0;
        }
        if line_number == self.line_count {
            return self.length - self.offset_at(line_number, 1);
        }
        (self.offset_at(line_number + 1, 1) - self.offset_at(line_number, 1))
            .saturating_sub(self.eol.len())
    }

    /// Byte value at `(line, column)`, or `None` outside the document.
    #[must_use]
    pub fn line_char_code(&self, line_number: usize, column: usize) -> Option<u8> {
        if line_number < 1 || line_number > self.line_count || column < 1 {
            return None;
        }
        let pos = self.node_at_line(line_number, column);
        if pos.node.is_nil() {
            return None;
        }
        let piece = self.node(pos.node).piece;
        let chunk = &self.buffers[piece.buffer_index];
        let offset = chunk.offset_of(piece.start) + pos.remainder;
        chunk.bytes().get(offset).copied()
    }

    /// Content between two positions, with optional terminator rewriting.
    ///
    /// When `eol` is given and differs from the buffer's normalized state,
    /// every terminator in the result is replaced by it.
    #[must_use]
    pub fn value_in_range(
        &self,
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
        eol: Option<&str>,
    ) -> String {
        if start_line == end_line && start_column == end_column {
            return String::new();
        }

        let start_line = start_line.clamp(1, self.line_count);
        let end_line = end_line.clamp(1, self.line_count);
        let start = self.node_at_line(start_line, start_column.max(1));
        let end = self.node_at_line(end_line, end_column.max(1));

        let value = lossy_to_string(&self.value_between(start, end));

        match eol {
            Some(requested) if !requested.is_empty() => {
                if requested != self.eol.as_str() || !self.eol_normalized {
                    replace_line_endings(&value, requested)
                } else {
                    value
                }
            }
            _ => value,
        }
    }

    /// Bytes between two located endpoints, walking pieces in order.
    fn value_between(&self, start: NodePosition, end: NodePosition) -> Vec<u8> {
        if start.node.is_nil() || end.node.is_nil() {
            return Vec::new();
        }

        if start.node == end.node {
            let bytes = self.node_bytes(start.node);
            return bytes
                .get(start.remainder..end.remainder)
                .unwrap_or(&[])
                .to_vec();
        }

        let mut out = Vec::new();
        let first = self.node_bytes(start.node);
        out.extend_from_slice(first.get(start.remainder..).unwrap_or(&[]));

        let mut x = self.nodes.next(start.node);
        while !x.is_nil() {
            let bytes = self.node_bytes(x);
            if x == end.node {
                out.extend_from_slice(bytes.get(..end.remainder).unwrap_or(&[]));
                break;
            }
            out.extend_from_slice(bytes);
            x = self.nodes.next(x);
        }

        out
    }

    /// Every line of the document, terminators stripped.
    #[must_use]
    pub fn lines_content(&self) -> Vec<String> {
        split_lines(&self.lines_raw_content())
    }

    /// The whole document as one string.
    #[must_use]
    pub fn lines_raw_content(&self) -> String {
        lossy_to_string(&self.content_bytes())
    }

    /// A read-only copy of the document, prefixed with `bom`, unaffected by
    /// later edits.
    #[must_use]
    pub fn snapshot(&self, bom: &str) -> Snapshot {
        Snapshot::new(bom, self.content_bytes())
    }
}
