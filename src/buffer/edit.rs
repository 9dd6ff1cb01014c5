//! Edit engine: insert, delete, and the CRLF repair protocol.
//!
//! Inserts never copy document text. Small inserts append to the change
//! buffer (the common typing case extends the last piece in place); large
//! inserts are chopped into fresh buffers. Deletes only rewrite piece
//! windows and drop nodes.
//!
//! Every edit that could place a `\n` right after an unpaired `\r`, or split
//! an existing `\r\n`, runs the repair protocol so that a CRLF pair always
//! lives inside a single piece — line counting depends on it.

use tracing::{trace, warn};

use crate::buffer::node::{BufferCursor, NodeId, Piece};
use crate::buffer::{TextBuffer, AVERAGE_BUFFER_SIZE};
use crate::chunk::ChunkBuffer;
use crate::scan::{ends_with_cr, line_starts_fast, starts_with_lf};

impl TextBuffer {
    /// Insert `text` at byte `offset`.
    ///
    /// `offset` is clamped to the document; empty text is a no-op. Pass
    /// `eol_normalized = true` only when the caller guarantees every
    /// terminator in `text` already matches the buffer's EOL; anything else
    /// clears the buffer's normalized flag.
    pub fn insert(&mut self, offset: usize, text: &str, eol_normalized: bool) {
        if text.is_empty() {
            return;
        }
        let offset = offset.min(self.length);
        trace!(offset, len = text.len(), "insert");

        self.eol_normalized = self.eol_normalized && eol_normalized;
        self.line_cache.clear();

        if self.root.is_nil() {
            let pieces = self.create_new_pieces(text);
            let mut node = NodeId::NIL;
            for (k, piece) in pieces.into_iter().enumerate() {
                node = if k == 0 {
                    self.rb_insert_left(NodeId::NIL, piece)
                } else {
                    self.rb_insert_right(node, piece)
                };
            }
        } else {
            let pos = self.node_at(offset);
            let node = pos.node;
            let remainder = pos.remainder;
            let node_start_offset = pos.node_start_offset;
            let piece = self.node(node).piece;
            let insert_pos = self.position_in_buffer(node, remainder);

            // Hot path: typing at the tail of the change-buffer piece.
            if piece.buffer_index == 0
                && piece.end == self.last_change_buffer_pos
                && node_start_offset + piece.length == offset
                && text.len() < AVERAGE_BUFFER_SIZE
            {
                self.append_to_node(node, text.to_string());
                self.compute_buffer_metadata();
                debug_assert!(self.check_invariants().is_ok());
                return;
            }

            if node_start_offset == offset {
                self.insert_content_to_node_left(text.to_string(), node);
            } else if node_start_offset + piece.length > offset {
                self.insert_into_node_middle(text, node, remainder, insert_pos);
            } else {
                self.insert_content_to_node_right(text.to_string(), node);
            }
            // Everything at or past the edit point moved.
            self.search_cache.invalidate(offset, &self.nodes);
        }

        self.compute_buffer_metadata();
        debug_assert!(self.check_invariants().is_ok());
    }

    /// Split `node` at `remainder` and splice the new content between the
    /// two halves, handling both CRLF seams the split can create.
    fn insert_into_node_middle(
        &mut self,
        text: &str,
        node: NodeId,
        remainder: usize,
        insert_pos: BufferCursor,
    ) {
        let piece = self.node(node).piece;
        let mut nodes_to_del = Vec::new();
        let mut value = text.to_string();

        let mut new_right_piece = Piece::new(
            piece.buffer_index,
            insert_pos,
            piece.end,
            self.line_feed_count_in(piece.buffer_index, insert_pos, piece.end),
            self.offset_in_buffer(piece.buffer_index, piece.end)
                - self.offset_in_buffer(piece.buffer_index, insert_pos),
        );

        if self.should_check_crlf()
            && ends_with_cr(&value)
            && self.node_char_code(node, remainder) == Some(b'\n')
        {
            // The new text ends in \r and lands right before a \n: steal the
            // \n out of the right remnant so the pair stays together.
            let new_start = BufferCursor::new(new_right_piece.start.line + 1, 0);
            new_right_piece = Piece::new(
                new_right_piece.buffer_index,
                new_start,
                new_right_piece.end,
                self.line_feed_count_in(new_right_piece.buffer_index, new_start, new_right_piece.end),
                new_right_piece.length - 1,
            );
            value.push('\n');
        }

        if self.should_check_crlf()
            && starts_with_lf(&value)
            && self.node_char_code(node, remainder - 1) == Some(b'\r')
        {
            // The new text starts with \n right after a \r: pull the \r out
            // of the left half instead.
            let previous_pos = self.position_in_buffer(node, remainder - 1);
            self.delete_node_tail(node, previous_pos);
            value.insert(0, '\r');
            if self.node(node).piece.length == 0 {
                nodes_to_del.push(node);
            }
        } else {
            self.delete_node_tail(node, insert_pos);
        }

        let new_pieces = self.create_new_pieces(&value);
        if new_right_piece.length > 0 {
            self.rb_insert_right(node, new_right_piece);
        }

        let mut tmp = node;
        let mut first_new = NodeId::NIL;
        for piece in new_pieces {
            tmp = self.rb_insert_right(tmp, piece);
            if first_new.is_nil() {
                first_new = tmp;
            }
        }

        self.delete_nodes(nodes_to_del);
        if !first_new.is_nil() {
            self.validate_crlf_with_prev_node(first_new);
        }
    }

    /// Splice new content immediately before `node`.
    fn insert_content_to_node_left(&mut self, mut value: String, node: NodeId) {
        let mut nodes_to_del = Vec::new();

        if self.should_check_crlf() && ends_with_cr(&value) && self.node_starts_with_lf(node) {
            // Move node's leading \n onto the new text's trailing \r.
            let piece = self.node(node).piece;
            let new_start = BufferCursor::new(piece.start.line + 1, 0);
            let new_lf = self.line_feed_count_in(piece.buffer_index, new_start, piece.end);
            self.node_mut(node).piece =
                Piece::new(piece.buffer_index, new_start, piece.end, new_lf, piece.length - 1);
            value.push('\n');
            self.update_tree_metadata(node, -1, -1);

            if self.node(node).piece.length == 0 {
                nodes_to_del.push(node);
            }
        }

        let new_pieces = self.create_new_pieces(&value);
        let new_node = self.rb_insert_left(node, new_pieces[0]);
        let mut last = new_node;
        for piece in new_pieces.into_iter().skip(1) {
            last = self.rb_insert_right(last, piece);
        }

        self.validate_crlf_with_prev_node(new_node);
        self.delete_nodes(nodes_to_del);
    }

    /// Splice new content immediately after `node`.
    fn insert_content_to_node_right(&mut self, mut value: String, node: NodeId) {
        if self.adjust_carriage_return_from_next(&value, node) {
            value.push('\n');
        }

        let new_pieces = self.create_new_pieces(&value);
        let new_node = self.rb_insert_right(node, new_pieces[0]);
        let mut last = new_node;
        for piece in new_pieces.into_iter().skip(1) {
            last = self.rb_insert_right(last, piece);
        }

        self.validate_crlf_with_prev_node(new_node);
    }

    /// Delete `count` bytes starting at `offset`, both clamped.
    pub fn delete(&mut self, offset: usize, count: usize) {
        if count == 0 || self.root.is_nil() || offset >= self.length {
            return;
        }
        let count = count.min(self.length - offset);
        trace!(offset, count, "delete");
        let expected_length = self.length - count;

        self.line_cache.clear();

        let start_pos = self.node_at(offset);
        let end_pos = self.node_at(offset + count);
        let start_node = start_pos.node;
        let end_node = end_pos.node;

        if start_node == end_node {
            let start_split = self.position_in_buffer(start_node, start_pos.remainder);
            let end_split = self.position_in_buffer(start_node, end_pos.remainder);

            if start_pos.node_start_offset == offset {
                if count == self.node(start_node).piece.length {
                    // The whole piece goes away.
                    let next = self.nodes.next(start_node);
                    self.rb_delete(start_node);
                    self.validate_crlf_with_prev_node(next);
                    self.finish_delete(expected_length);
                    return;
                }
                // Prefix.
                self.delete_node_head(start_node, end_split);
                self.search_cache.invalidate(offset, &self.nodes);
                self.validate_crlf_with_prev_node(start_node);
                self.finish_delete(expected_length);
                return;
            }

            if start_pos.node_start_offset + self.node(start_node).piece.length == offset + count {
                // Suffix.
                self.delete_node_tail(start_node, start_split);
                self.validate_crlf_with_next_node(start_node);
                self.finish_delete(expected_length);
                return;
            }

            // Middle: shrink to the head and splice a right remnant.
            self.shrink_node(start_node, start_split, end_split);
            self.finish_delete(expected_length);
            return;
        }

        let mut nodes_to_del = Vec::new();

        let start_split = self.position_in_buffer(start_node, start_pos.remainder);
        self.delete_node_tail(start_node, start_split);
        self.search_cache.invalidate(offset, &self.nodes);
        if self.node(start_node).piece.length == 0 {
            nodes_to_del.push(start_node);
        }

        let end_split = self.position_in_buffer(end_node, end_pos.remainder);
        self.delete_node_head(end_node, end_split);
        if self.node(end_node).piece.length == 0 {
            nodes_to_del.push(end_node);
        }

        let mut node = self.nodes.next(start_node);
        while !node.is_nil() && node != end_node {
            nodes_to_del.push(node);
            node = self.nodes.next(node);
        }

        let prev = if self.node(start_node).piece.length == 0 {
            self.nodes.prev(start_node)
        } else {
            start_node
        };
        self.delete_nodes(nodes_to_del);
        self.validate_crlf_with_next_node(prev);
        self.finish_delete(expected_length);
    }

    /// Shared delete epilogue: refresh counts, reconcile drift, validate.
    fn finish_delete(&mut self, expected_length: usize) {
        self.compute_buffer_metadata();
        if self.length != expected_length {
            warn!(
                recorded = self.length,
                expected = expected_length,
                "length drift after delete; recomputing from pieces"
            );
            let (length, line_feeds) = self.direct_sums();
            self.length = length;
            self.line_count = 1 + line_feeds;
        }
        debug_assert!(self.check_invariants().is_ok());
    }

    fn delete_nodes(&mut self, nodes: Vec<NodeId>) {
        for id in nodes {
            self.rb_delete(id);
        }
    }

    // ------------------------------------------------------------------
    // Piece surgery
    // ------------------------------------------------------------------

    /// Retreat `node`'s end to `pos`, keeping its head authoritative.
    pub(crate) fn delete_node_tail(&mut self, node: NodeId, pos: BufferCursor) {
        let piece = self.node(node).piece;
        let original_end_offset = self.offset_in_buffer(piece.buffer_index, piece.end);

        let new_end_offset = self.offset_in_buffer(piece.buffer_index, pos);
        let new_lf = self.line_feed_count_in(piece.buffer_index, piece.start, pos);

        let lf_delta = new_lf as isize - piece.line_feed_count as isize;
        let size_delta = new_end_offset as isize - original_end_offset as isize;
        let new_length = (piece.length as isize + size_delta) as usize;

        self.node_mut(node).piece =
            Piece::new(piece.buffer_index, piece.start, pos, new_lf, new_length);
        self.update_tree_metadata(node, size_delta, lf_delta);
    }

    /// Advance `node`'s start to `pos`.
    pub(crate) fn delete_node_head(&mut self, node: NodeId, pos: BufferCursor) {
        let piece = self.node(node).piece;
        let original_start_offset = self.offset_in_buffer(piece.buffer_index, piece.start);

        let new_start_offset = self.offset_in_buffer(piece.buffer_index, pos);
        let new_lf = self.line_feed_count_in(piece.buffer_index, pos, piece.end);

        let lf_delta = new_lf as isize - piece.line_feed_count as isize;
        let size_delta = original_start_offset as isize - new_start_offset as isize;
        let new_length = (piece.length as isize + size_delta) as usize;

        self.node_mut(node).piece =
            Piece::new(piece.buffer_index, pos, piece.end, new_lf, new_length);
        self.update_tree_metadata(node, size_delta, lf_delta);
    }

    /// Cut `[start, end)` out of the middle of `node`: shrink it to the
    /// head and splice a fresh piece for the surviving tail.
    pub(crate) fn shrink_node(&mut self, node: NodeId, start: BufferCursor, end: BufferCursor) {
        let piece = self.node(node).piece;
        let original_end = piece.end;

        let old_length = piece.length;
        let old_lf = piece.line_feed_count;
        let new_lf = self.line_feed_count_in(piece.buffer_index, piece.start, start);
        let new_length = self.offset_in_buffer(piece.buffer_index, start)
            - self.offset_in_buffer(piece.buffer_index, piece.start);

        self.node_mut(node).piece =
            Piece::new(piece.buffer_index, piece.start, start, new_lf, new_length);
        self.update_tree_metadata(
            node,
            new_length as isize - old_length as isize,
            new_lf as isize - old_lf as isize,
        );

        let tail_piece = Piece::new(
            piece.buffer_index,
            end,
            original_end,
            self.line_feed_count_in(piece.buffer_index, end, original_end),
            self.offset_in_buffer(piece.buffer_index, original_end)
                - self.offset_in_buffer(piece.buffer_index, end),
        );
        let new_node = self.rb_insert_right(node, tail_piece);
        self.validate_crlf_with_prev_node(new_node);
    }

    // ------------------------------------------------------------------
    // Piece creation
    // ------------------------------------------------------------------

    /// Materialize `text` as one or more pieces.
    ///
    /// Small inputs append to the change buffer. If that append would place
    /// a leading `\n` directly after the buffer's current trailing `\r`
    /// (two bytes owned by *different* pieces), a one-byte filler is written
    /// between them and the piece starts past it — otherwise the line-start
    /// table would fuse a CRLF across the piece seam. Large inputs are
    /// chopped into blocks of at most [`AVERAGE_BUFFER_SIZE`] bytes, each
    /// installed as its own buffer; block boundaries never split a `\r\n`
    /// or a UTF-8 multi-byte sequence.
    pub(crate) fn create_new_pieces(&mut self, text: &str) -> Vec<Piece> {
        if text.len() > AVERAGE_BUFFER_SIZE {
            let mut rest = text;
            let mut pieces = Vec::new();
            while rest.len() > AVERAGE_BUFFER_SIZE {
                let mut split = AVERAGE_BUFFER_SIZE;
                if rest.as_bytes()[split - 1] == b'\r' {
                    split -= 1;
                } else {
                    while !rest.is_char_boundary(split) {
                        split -= 1;
                    }
                }
                let (block, tail) = rest.split_at(split);
                pieces.push(self.push_block_buffer(block));
                rest = tail;
            }
            pieces.push(self.push_block_buffer(rest));
            return pieces;
        }

        let mut start_offset = self.buffers[0].len();
        let mut start = self.last_change_buffer_pos;

        let change = &self.buffers[0];
        let tail_is_line_start = change.line_starts[change.line_starts.len() - 1] == start_offset;

        if tail_is_line_start
            && start_offset != 0
            && starts_with_lf(text)
            && ends_with_cr(&self.buffers[0].buffer)
        {
            self.last_change_buffer_pos = BufferCursor::new(
                self.last_change_buffer_pos.line,
                self.last_change_buffer_pos.column + 1,
            );
            start = self.last_change_buffer_pos;

            let mut line_starts = line_starts_fast(text);
            for ls in &mut line_starts {
                *ls += start_offset + 1;
            }
            self.buffers[0].line_starts.extend_from_slice(&line_starts[1..]);
            self.buffers[0].buffer.push('_');
            self.buffers[0].buffer.push_str(text);
            start_offset += 1;
        } else {
            self.buffers[0].append(text);
        }

        let end_offset = self.buffers[0].len();
        let end_index = self.buffers[0].line_starts.len() - 1;
        let end_column = end_offset - self.buffers[0].line_starts[end_index];
        let end_pos = BufferCursor::new(end_index, end_column);

        let piece = Piece::new(
            0,
            start,
            end_pos,
            self.line_feed_count_in(0, start, end_pos),
            end_offset - start_offset,
        );
        self.last_change_buffer_pos = end_pos;
        vec![piece]
    }

    /// Install `block` as a fresh immutable buffer with a full-buffer piece.
    fn push_block_buffer(&mut self, block: &str) -> Piece {
        let line_starts = line_starts_fast(block);
        let last_line = line_starts.len() - 1;
        let piece = Piece::new(
            self.buffers.len(),
            BufferCursor::new(0, 0),
            BufferCursor::new(last_line, block.len() - line_starts[last_line]),
            last_line,
            block.len(),
        );
        self.buffers
            .push(ChunkBuffer::new(block.to_string(), line_starts));
        piece
    }

    /// Extend the change-buffer tail piece in place. Strictly O(log n):
    /// one buffer append plus one metadata walk.
    fn append_to_node(&mut self, node: NodeId, mut value: String) {
        if self.adjust_carriage_return_from_next(&value, node) {
            value.push('\n');
        }

        let hit_crlf =
            self.should_check_crlf() && starts_with_lf(&value) && self.node_ends_with_cr(node);

        let start_offset = self.buffers[0].len();
        if hit_crlf {
            // The appended \n pairs with the \r already at the tail: fold
            // the two line starts into one and step the tail cursor back
            // onto the \r's line.
            self.buffers[0].buffer.push_str(&value);
            let mut line_starts = line_starts_fast(&value);
            for ls in &mut line_starts {
                *ls += start_offset;
            }
            let starts_len = self.buffers[0].line_starts.len();
            let prev_start = self.buffers[0].line_starts[starts_len - 2];
            self.buffers[0].line_starts.pop();
            self.last_change_buffer_pos = BufferCursor::new(
                self.last_change_buffer_pos.line - 1,
                start_offset - prev_start,
            );
            self.buffers[0].line_starts.extend_from_slice(&line_starts[1..]);
        } else {
            self.buffers[0].append(&value);
        }

        let end_index = self.buffers[0].line_starts.len() - 1;
        let end_column = self.buffers[0].len() - self.buffers[0].line_starts[end_index];
        let new_end = BufferCursor::new(end_index, end_column);

        let piece = self.node(node).piece;
        let new_length = piece.length + value.len();
        let new_lf = self.line_feed_count_in(0, piece.start, new_end);
        let lf_delta = new_lf as isize - piece.line_feed_count as isize;

        self.node_mut(node).piece =
            Piece::new(piece.buffer_index, piece.start, new_end, new_lf, new_length);
        self.last_change_buffer_pos = new_end;
        self.update_tree_metadata(node, value.len() as isize, lf_delta);
    }

    // ------------------------------------------------------------------
    // CRLF repair
    // ------------------------------------------------------------------

    /// If `value` ends with `\r` and `node`'s successor starts with `\n`,
    /// steal that `\n` (shrinking or deleting the successor) and report
    /// that the caller should append it to `value`.
    fn adjust_carriage_return_from_next(&mut self, value: &str, node: NodeId) -> bool {
        if !self.should_check_crlf() || !ends_with_cr(value) {
            return false;
        }
        let next = self.nodes.next(node);
        if !self.node_starts_with_lf(next) {
            return false;
        }

        if self.node(next).piece.length == 1 {
            self.rb_delete(next);
        } else {
            let piece = self.node(next).piece;
            let new_start = BufferCursor::new(piece.start.line + 1, 0);
            let new_lf = self.line_feed_count_in(piece.buffer_index, new_start, piece.end);
            self.node_mut(next).piece =
                Piece::new(piece.buffer_index, new_start, piece.end, new_lf, piece.length - 1);
            self.update_tree_metadata(next, -1, -1);
        }
        true
    }

    /// Repair the seam on `node`'s left: if `node` starts with `\n` and its
    /// predecessor ends with `\r`, rejoin them.
    pub(crate) fn validate_crlf_with_prev_node(&mut self, node: NodeId) {
        if !self.should_check_crlf() || !self.node_starts_with_lf(node) {
            return;
        }
        let prev = self.nodes.prev(node);
        if !prev.is_nil() && self.node_ends_with_cr(prev) {
            self.fix_crlf(prev, node);
        }
    }

    /// Repair the seam on `node`'s right: if `node` ends with `\r` and its
    /// successor starts with `\n`, rejoin them.
    pub(crate) fn validate_crlf_with_next_node(&mut self, node: NodeId) {
        if node.is_nil() || !self.should_check_crlf() || !self.node_ends_with_cr(node) {
            return;
        }
        let next = self.nodes.next(node);
        if !next.is_nil() && self.node_starts_with_lf(next) {
            self.fix_crlf(node, next);
        }
    }

    /// Rejoin a `\r` at the tail of `prev` with the `\n` at the head of
    /// `next` into one fresh two-byte piece between them.
    fn fix_crlf(&mut self, prev: NodeId, next: NodeId) {
        let mut nodes_to_del = Vec::new();

        let prev_piece = self.node(prev).piece;
        let new_end = if prev_piece.end.column == 0 {
            // The \r sits at the very end of its line: step back a line.
            let line_starts = &self.buffers[prev_piece.buffer_index].line_starts;
            BufferCursor::new(
                prev_piece.end.line - 1,
                line_starts[prev_piece.end.line] - line_starts[prev_piece.end.line - 1] - 1,
            )
        } else {
            BufferCursor::new(prev_piece.end.line, prev_piece.end.column - 1)
        };
        self.node_mut(prev).piece = Piece::new(
            prev_piece.buffer_index,
            prev_piece.start,
            new_end,
            prev_piece.line_feed_count - 1,
            prev_piece.length - 1,
        );
        self.update_tree_metadata(prev, -1, -1);
        if self.node(prev).piece.length == 0 {
            nodes_to_del.push(prev);
        }

        let next_piece = self.node(next).piece;
        let new_start = BufferCursor::new(next_piece.start.line + 1, 0);
        let new_lf = self.line_feed_count_in(next_piece.buffer_index, new_start, next_piece.end);
        self.node_mut(next).piece = Piece::new(
            next_piece.buffer_index,
            new_start,
            next_piece.end,
            new_lf,
            next_piece.length - 1,
        );
        self.update_tree_metadata(next, -1, -1);
        if self.node(next).piece.length == 0 {
            nodes_to_del.push(next);
        }

        let pieces = self.create_new_pieces("\r\n");
        self.rb_insert_right(prev, pieces[0]);

        for id in nodes_to_del {
            self.rb_delete(id);
        }
    }
}
