//! Line-terminator scanning.
//!
//! Everything in this crate that needs to know where lines begin goes
//! through these two scanners. Both are single-pass over the raw bytes and
//! treat `\r\n` as one terminator: exactly one line start is recorded, at
//! the byte after the `\n`.

/// Result of a counting scan over one chunk of text.
///
/// `cr` and `lf` count *lone* terminators; a `\r\n` pair counts only toward
/// `crlf`. The builder aggregates these tallies across chunks to elect the
/// document terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStarts {
    /// Byte offset of each line start. `offsets[0]` is always 0.
    pub offsets: Vec<usize>,
    /// Lone `\r` count.
    pub cr: usize,
    /// Lone `\n` count.
    pub lf: usize,
    /// `\r\n` pair count.
    pub crlf: usize,
    /// True when every byte was <= 0x7F.
    pub is_basic_ascii: bool,
}

/// Counting scan: line starts plus terminator statistics.
#[must_use]
pub fn line_starts_full(text: &str) -> LineStarts {
    let bytes = text.as_bytes();
    let mut offsets = vec![0];
    let mut cr = 0;
    let mut lf = 0;
    let mut crlf = 0;
    let mut is_basic_ascii = true;

    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch > 0x7F {
            is_basic_ascii = false;
        }
        if ch == b'\r' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                crlf += 1;
                i += 1;
            } else {
                cr += 1;
            }
            offsets.push(i + 1);
        } else if ch == b'\n' {
            lf += 1;
            offsets.push(i + 1);
        }
        i += 1;
    }

    LineStarts {
        offsets,
        cr,
        lf,
        crlf,
        is_basic_ascii,
    }
}

/// Fast scan: line starts only, for text whose EOL mix is already known.
#[must_use]
pub fn line_starts_fast(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut offsets = vec![0];

    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'\r' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                i += 1;
            }
            offsets.push(i + 1);
        } else if ch == b'\n' {
            offsets.push(i + 1);
        }
        i += 1;
    }

    offsets
}

/// Split text into lines on any of `\r\n`, `\r`, `\n`.
///
/// The result always has `terminator count + 1` entries; `""` splits to
/// `[""]` and a trailing terminator yields a trailing empty line.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut line_start = 0;

    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'\r' || ch == b'\n' {
            lines.push(lossy_to_string(&bytes[line_start..i]));
            if ch == b'\r' && i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                i += 1;
            }
            line_start = i + 1;
        }
        i += 1;
    }
    lines.push(lossy_to_string(&bytes[line_start..]));

    lines
}

/// Rewrite every `\r\n`, `\r`, or `\n` in `text` to `eol`.
#[must_use]
pub fn replace_line_endings(text: &str, eol: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut run_start = 0;

    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'\r' || ch == b'\n' {
            out.push_str(&text[run_start..i]);
            out.push_str(eol);
            if ch == b'\r' && i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                i += 1;
            }
            run_start = i + 1;
        }
        i += 1;
    }
    out.push_str(&text[run_start..]);

    out
}

/// Does `text` start with a line feed?
#[must_use]
pub(crate) fn starts_with_lf(text: &str) -> bool {
    text.as_bytes().first() == Some(&b'\n')
}

/// Does `text` end with a carriage return?
#[must_use]
pub(crate) fn ends_with_cr(text: &str) -> bool {
    text.as_bytes().last() == Some(&b'\r')
}

/// Convert a byte slice to a `String`, tolerating windows that land inside
/// a multi-byte sequence. Valid UTF-8 converts losslessly.
#[must_use]
pub(crate) fn lossy_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
