//! Streaming construction of text buffers.
//!
//! [`TextBufferBuilder`] accepts file content chunk by chunk (in whatever
//! sizes the loader reads), keeps a one-character hold-back so a `\r\n`
//! split across two reads is reassembled, strips a UTF-8 BOM off the first
//! chunk, and tallies terminator statistics. [`TextBufferBuilder::finish`]
//! yields a [`TextBufferFactory`], which elects the document terminator,
//! optionally normalizes all content to it, and materializes the tree.

use tracing::debug;

use crate::buffer::TextBuffer;
use crate::chunk::ChunkBuffer;
use crate::scan::{line_starts_full, replace_line_endings};

/// The UTF-8 byte-order mark.
const UTF8_BOM: &str = "\u{FEFF}";

/// A line terminator: `\n` or `\r\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndOfLine {
    /// `\n`
    Lf,
    /// `\r\n`
    Crlf,
}

impl EndOfLine {
    /// The terminator bytes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }

    /// Terminator length in bytes.
    #[must_use]
    pub fn len(self) -> usize {
        self.as_str().len()
    }
}

/// Streamed chunk collector.
#[derive(Debug, Default)]
pub struct TextBufferBuilder {
    chunks: Vec<ChunkBuffer>,
    bom: bool,
    has_previous_char: bool,
    previous_char: char,
    cr: usize,
    lf: usize,
    crlf: usize,
}

impl TextBufferBuilder {
    /// A builder with no content yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the next chunk of the document.
    ///
    /// Empty chunks are ignored. The first chunk only has a leading UTF-8
    /// BOM stripped. A trailing `\r` is held back and prepended to the next
    /// chunk so a CRLF pair never straddles two buffers.
    pub fn accept_chunk(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }

        let chunk = if self.chunks.is_empty() && !self.has_previous_char {
            if let Some(stripped) = chunk.strip_prefix(UTF8_BOM) {
                self.bom = true;
                stripped
            } else {
                chunk
            }
        } else {
            chunk
        };

        if let Some(head) = chunk.strip_suffix('\r') {
            self.push_chunk(head);
            self.has_previous_char = true;
            self.previous_char = '\r';
        } else {
            self.push_chunk(chunk);
            self.has_previous_char = false;
        }
    }

    /// Push one completed chunk, reattaching any held-back character.
    fn push_chunk(&mut self, chunk: &str) {
        if chunk.is_empty() && !self.has_previous_char {
            return;
        }

        let text = if self.has_previous_char {
            self.has_previous_char = false;
            let mut text = String::with_capacity(chunk.len() + 1);
            text.push(self.previous_char);
            text.push_str(chunk);
            text
        } else {
            chunk.to_string()
        };
        if text.is_empty() {
            return;
        }

        let scan = line_starts_full(&text);
        self.cr += scan.cr;
        self.lf += scan.lf;
        self.crlf += scan.crlf;
        self.chunks.push(ChunkBuffer::new(text, scan.offsets));
    }

    /// Seal the builder.
    ///
    /// A still-held `\r` is appended as its own trailing chunk. Pass
    /// `normalize_eol = true` to have the factory rewrite every terminator
    /// to the elected one.
    #[must_use]
    pub fn finish(mut self, normalize_eol: bool) -> TextBufferFactory {
        if self.has_previous_char {
            let held = self.previous_char.to_string();
            self.has_previous_char = false;
            let scan = line_starts_full(&held);
            self.cr += scan.cr;
            self.lf += scan.lf;
            self.crlf += scan.crlf;
            self.chunks.push(ChunkBuffer::new(held, scan.offsets));
        }

        debug!(
            chunks = self.chunks.len(),
            cr = self.cr,
            lf = self.lf,
            crlf = self.crlf,
            bom = self.bom,
            "builder finished"
        );

        TextBufferFactory {
            chunks: self.chunks,
            bom: self.bom,
            cr: self.cr,
            lf: self.lf,
            crlf: self.crlf,
            normalize_eol,
        }
    }
}

/// Sealed chunk set, ready to materialize buffers.
#[derive(Debug)]
pub struct TextBufferFactory {
    chunks: Vec<ChunkBuffer>,
    bom: bool,
    cr: usize,
    lf: usize,
    crlf: usize,
    normalize_eol: bool,
}

impl TextBufferFactory {
    /// The elected terminator: the default when the content has none,
    /// otherwise CRLF when CR-flavoured terminators outnumber half the
    /// total, else LF.
    #[must_use]
    pub fn eol(&self, default_eol: EndOfLine) -> EndOfLine {
        let total = self.cr + self.lf + self.crlf;
        if total == 0 {
            return default_eol;
        }
        if self.cr + self.crlf > total / 2 {
            EndOfLine::Crlf
        } else {
            EndOfLine::Lf
        }
    }

    /// Did the first chunk carry a UTF-8 BOM?
    #[must_use]
    pub fn bom(&self) -> &'static str {
        if self.bom {
            UTF8_BOM
        } else {
            ""
        }
    }

    /// Materialize the piece tree.
    #[must_use]
    pub fn create(mut self, default_eol: EndOfLine) -> TextBuffer {
        let eol = self.eol(default_eol);

        let needs_rewrite = self.normalize_eol
            && ((eol == EndOfLine::Crlf && (self.cr > 0 || self.lf > 0))
                || (eol == EndOfLine::Lf && (self.cr > 0 || self.crlf > 0)));

        debug!(
            eol = eol.as_str(),
            normalize = self.normalize_eol,
            rewrite = needs_rewrite,
            "creating piece tree"
        );

        if needs_rewrite {
            for chunk in &mut self.chunks {
                let text = replace_line_endings(&chunk.buffer, eol.as_str());
                *chunk = ChunkBuffer::from_text(text);
            }
        }

        TextBuffer::from_chunks(self.chunks, eol, self.normalize_eol)
    }

    /// The first line of the content, reading at most `limit` bytes.
    ///
    /// Used to preview a file before materializing the tree.
    #[must_use]
    pub fn first_line_text(&self, limit: usize) -> String {
        let Some(first) = self.chunks.first() else {
            return String::new();
        };

        let mut end = limit.min(first.buffer.len());
        while !first.buffer.is_char_boundary(end) {
            end -= 1;
        }
        let window = &first.buffer[..end];

        let line = window.split('\n').next().unwrap_or("");
        line.strip_suffix('\r').unwrap_or(line).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder() {
        let buf = TextBufferBuilder::new().finish(false).create(EndOfLine::Lf);
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.eol(), EndOfLine::Lf);

        let buf = TextBufferBuilder::new().finish(false).create(EndOfLine::Crlf);
        assert_eq!(buf.eol(), EndOfLine::Crlf);
    }

    #[test]
    fn test_bom_stripped_on_first_chunk_only() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("\u{FEFF}abc");
        builder.accept_chunk("def");
        let factory = builder.finish(false);
        assert_eq!(factory.bom(), "\u{FEFF}");
        let buf = factory.create(EndOfLine::Lf);
        assert_eq!(buf.lines_raw_content(), "abcdef");
    }

    #[test]
    fn test_bom_not_stripped_mid_stream() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("abc");
        builder.accept_chunk("\u{FEFF}def");
        let buf = builder.finish(false).create(EndOfLine::Lf);
        assert_eq!(buf.lines_raw_content(), "abc\u{FEFF}def");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("ab\r");
        builder.accept_chunk("\ncd");
        let buf = builder.finish(false).create(EndOfLine::Lf);
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.lines_content(), vec!["ab", "cd"]);
        // The pair was counted as one CRLF, not a CR plus an LF.
        assert_eq!(buf.eol(), EndOfLine::Crlf);
    }

    #[test]
    fn test_trailing_cr_flushed_on_finish() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("ab\r");
        let buf = builder.finish(false).create(EndOfLine::Lf);
        assert_eq!(buf.lines_raw_content(), "ab\r");
        assert_eq!(buf.line_count(), 2);
    }

    #[test]
    fn test_lone_cr_document() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("\r");
        let buf = builder.finish(false).create(EndOfLine::Lf);
        assert_eq!(buf.lines_raw_content(), "\r");
        assert_eq!(buf.line_count(), 2);
    }

    #[test]
    fn test_eol_election() {
        let factory = |text: &str| {
            let mut b = TextBufferBuilder::new();
            b.accept_chunk(text);
            b.finish(false)
        };

        // No terminators: the default wins.
        assert_eq!(factory("abc").eol(EndOfLine::Crlf), EndOfLine::Crlf);
        assert_eq!(factory("abc").eol(EndOfLine::Lf), EndOfLine::Lf);

        // Pure populations.
        assert_eq!(factory("a\r\nb\r\nc").eol(EndOfLine::Lf), EndOfLine::Crlf);
        assert_eq!(factory("a\nb\nc").eol(EndOfLine::Crlf), EndOfLine::Lf);

        // CR-flavoured majority: one CRLF + one lone CR out of three.
        assert_eq!(factory("a\r\nb\nc\rd").eol(EndOfLine::Lf), EndOfLine::Crlf);

        // LF majority.
        assert_eq!(factory("a\r\nb\nc\nd").eol(EndOfLine::Lf), EndOfLine::Lf);

        // Exactly half CR-flavoured resolves to LF.
        assert_eq!(factory("a\r\nb\nc").eol(EndOfLine::Lf), EndOfLine::Lf);
    }

    #[test]
    fn test_normalize_to_lf() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("a\r\nb\nc\nd");
        let buf = builder.finish(true).create(EndOfLine::Lf);
        assert_eq!(buf.eol(), EndOfLine::Lf);
        assert!(buf.is_eol_normalized());
        assert_eq!(buf.lines_raw_content(), "a\nb\nc\nd");
        assert_eq!(buf.line_count(), 4);
    }

    #[test]
    fn test_normalize_to_crlf() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("a\r\nb\nc\rd");
        let buf = builder.finish(true).create(EndOfLine::Lf);
        assert_eq!(buf.eol(), EndOfLine::Crlf);
        assert_eq!(buf.lines_raw_content(), "a\r\nb\r\nc\r\nd");
        assert_eq!(buf.line_count(), 4);
    }

    #[test]
    fn test_no_rewrite_when_already_uniform() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("a\nb\nc");
        let buf = builder.finish(true).create(EndOfLine::Lf);
        assert!(buf.is_eol_normalized());
        assert_eq!(buf.lines_raw_content(), "a\nb\nc");
    }

    #[test]
    fn test_first_line_text() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("first line\r\nsecond");
        let factory = builder.finish(false);
        assert_eq!(factory.first_line_text(100), "first line");
        assert_eq!(factory.first_line_text(5), "first");

        let empty = TextBufferBuilder::new().finish(false);
        assert_eq!(empty.first_line_text(10), "");
    }

    #[test]
    fn test_first_line_text_respects_char_boundaries() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("héllo\nworld");
        let factory = builder.finish(false);
        // Limit 2 lands inside the two-byte é; the cut backs off.
        assert_eq!(factory.first_line_text(2), "h");
    }

    #[test]
    fn test_multi_chunk_document() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("abc\n");
        builder.accept_chunk("def");
        let buf = builder.finish(true).create(EndOfLine::Lf);
        assert_eq!(buf.len(), 7);
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.piece_count(), 2);
        assert_eq!(buf.lines_content(), vec!["abc", "def"]);
    }

    #[test]
    fn test_builder_ignores_empty_chunks() {
        let mut builder = TextBufferBuilder::new();
        builder.accept_chunk("");
        builder.accept_chunk("x");
        builder.accept_chunk("");
        let buf = builder.finish(false).create(EndOfLine::Lf);
        assert_eq!(buf.lines_raw_content(), "x");
    }
}
