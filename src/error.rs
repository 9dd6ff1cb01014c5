//! Error types for piecebuf.
//!
//! The editing and query APIs clamp out-of-range input instead of failing
//! (stale coordinates from frontends are routine), so they return plain
//! values. `Error` covers the diagnostics reported by
//! [`TextBuffer::check_invariants`](crate::TextBuffer::check_invariants):
//! conditions that indicate an implementation bug rather than bad input.

use std::fmt;

/// Result type alias for piecebuf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for piecebuf tree validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A node's `size_left`/`lf_left` disagree with its left subtree.
    AggregateMismatch {
        size_left: usize,
        actual_size: usize,
        lf_left: usize,
        actual_lf: usize,
    },
    /// A red node has a red child.
    RedViolation,
    /// Root-to-leaf paths disagree on black height.
    BlackHeightMismatch { left: usize, right: usize },
    /// The sentinel node is no longer black or has grown content.
    SentinelCorrupted,
    /// A piece's byte window lies outside its buffer.
    PieceOutOfBounds {
        buffer_index: usize,
        start: usize,
        end: usize,
        buffer_len: usize,
    },
    /// A piece's recorded length disagrees with its byte window.
    PieceLengthMismatch { recorded: usize, actual: usize },
    /// The document length disagrees with the sum over all pieces.
    LengthMismatch { recorded: usize, actual: usize },
    /// The line count disagrees with `1 + sum of piece line feeds`.
    LineCountMismatch { recorded: usize, actual: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AggregateMismatch {
                size_left,
                actual_size,
                lf_left,
                actual_lf,
            } => {
                write!(
                    f,
                    "aggregate mismatch: size_left={size_left} (subtree {actual_size}), \
                     lf_left={lf_left} (subtree {actual_lf})"
                )
            }
            Self::RedViolation => write!(f, "red node has a red child"),
            Self::BlackHeightMismatch { left, right } => {
                write!(f, "black height mismatch: left={left}, right={right}")
            }
            Self::SentinelCorrupted => write!(f, "sentinel node corrupted"),
            Self::PieceOutOfBounds {
                buffer_index,
                start,
                end,
                buffer_len,
            } => {
                write!(
                    f,
                    "piece window [{start}, {end}) outside buffer {buffer_index} of length {buffer_len}"
                )
            }
            Self::PieceLengthMismatch { recorded, actual } => {
                write!(f, "piece length {recorded} but window spans {actual} bytes")
            }
            Self::LengthMismatch { recorded, actual } => {
                write!(f, "document length {recorded} but pieces sum to {actual}")
            }
            Self::LineCountMismatch { recorded, actual } => {
                write!(f, "line count {recorded} but pieces imply {actual}")
            }
        }
    }
}

impl std::error::Error for Error {}
