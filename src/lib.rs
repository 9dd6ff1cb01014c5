//! `piecebuf` - Piece-tree text buffer engine
//!
//! piecebuf stores a document as a *piece tree*: an append-only set of
//! immutable byte buffers indexed by a balanced tree of pieces. Edits never
//! copy document text — they rewrite a handful of piece descriptors — so
//! insertion, deletion, offset↔(line, column) conversion, and line
//! retrieval are all O(log n), from tens of bytes to multi-gigabyte files.
//!
//! # How This Crate Fits In
//!
//! This is an engine, not an editor: it owns text storage and nothing else.
//! You bring file I/O (feed chunks to the builder), undo history, cursors,
//! and rendering; piecebuf keeps the document and answers questions about
//! it quickly.
//!
//! # Architecture At A Glance
//!
//! - `builder`: Streamed construction, BOM handling, EOL election
//! - `buffer`: The piece tree — edits, queries, CRLF repair, snapshots
//! - `chunk`: Immutable byte buffers with line-start tables
//! - `scan`: Single-pass line-terminator scanning
//! - `error`: Invariant-violation diagnostics
//!
//! # Data Flow
//!
//! ```text
//! Loader feeds chunks -> TextBufferBuilder
//!     -> TextBufferFactory elects the EOL (optionally normalizes)
//!     -> TextBuffer answers edits and queries
//!     -> Snapshot materializes the document for saving
//! ```
//!
//! # Example
//!
//! ```
//! use piecebuf::{EndOfLine, TextBufferBuilder};
//!
//! let mut builder = TextBufferBuilder::new();
//! builder.accept_chunk("hello\n");
//! builder.accept_chunk("world");
//! let mut buffer = builder.finish(true).create(EndOfLine::Lf);
//!
//! assert_eq!(buffer.line_count(), 2);
//! buffer.insert(5, ",", false);
//! assert_eq!(buffer.line_content(1), "hello,");
//! ```
//!
//! # Coordinates
//!
//! Offsets and columns count bytes; lines and columns are 1-based. The
//! engine does not interpret grapheme clusters or display width — callers
//! that need character-level columns layer that on top.

// Crate-level lint configuration
#![warn(unsafe_code)]
#![allow(clippy::module_name_repetitions)] // TextBufferBuilder etc. read better qualified
#![allow(clippy::cast_possible_wrap)] // Aggregate deltas are intentional isize casts
#![allow(clippy::cast_sign_loss)] // Reverse direction of the same delta math
#![allow(clippy::cast_possible_truncation)] // Arena indices fit u32 by construction
#![allow(clippy::len_without_is_empty)] // EndOfLine::len is a byte count, not a container
#![allow(clippy::missing_panics_doc)] // Internal invariants back the few expect()s
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer
#![allow(clippy::redundant_clone)] // Clones in tests for clarity are fine

pub mod buffer;
pub mod builder;
pub(crate) mod chunk;
pub mod error;
pub mod scan;

// Re-export core types at crate root
pub use buffer::{BufferCursor, Piece, Position, Snapshot, TextBuffer};
pub use builder::{EndOfLine, TextBufferBuilder, TextBufferFactory};
pub use error::{Error, Result};
