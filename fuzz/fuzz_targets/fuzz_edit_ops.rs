//! Fuzz target for the edit engine.
//!
//! Decodes arbitrary bytes into an edit script, replays it against both the
//! piece tree and a plain String model, and demands byte equality plus
//! every structural invariant after each step. Catches tree-rebalancing,
//! aggregate, and CRLF-repair bugs that hand-written cases miss.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use piecebuf::{EndOfLine, TextBufferBuilder};

#[derive(Arbitrary, Debug)]
enum Op {
    Insert { offset: u16, text: String },
    Delete { offset: u16, count: u8 },
    SetEol { crlf: bool },
    QueryLine { line: u16 },
    Roundtrip { offset: u16 },
}

#[derive(Arbitrary, Debug)]
struct Script {
    seed: String,
    ops: Vec<Op>,
}

const MAX_OPS: usize = 64;
const MAX_TEXT: usize = 256;

fuzz_target!(|script: Script| {
    let mut builder = TextBufferBuilder::new();
    builder.accept_chunk(&script.seed);
    let mut buf = builder.finish(false).create(EndOfLine::Lf);
    // The builder strips a leading BOM; the model must agree.
    let mut model = script
        .seed
        .strip_prefix('\u{FEFF}')
        .unwrap_or(&script.seed)
        .to_string();

    for op in script.ops.iter().take(MAX_OPS) {
        match op {
            Op::Insert { offset, text } => {
                if text.len() > MAX_TEXT {
                    continue;
                }
                let mut at = (*offset as usize) % (model.len() + 1);
                while !model.is_char_boundary(at) {
                    at -= 1;
                }
                model.insert_str(at, text);
                buf.insert(at, text, false);
            }
            Op::Delete { offset, count } => {
                let mut at = (*offset as usize) % (model.len() + 1);
                while !model.is_char_boundary(at) {
                    at -= 1;
                }
                let mut n = (*count as usize).min(model.len() - at);
                while !model.is_char_boundary(at + n) {
                    n -= 1;
                }
                model.replace_range(at..at + n, "");
                buf.delete(at, n);
            }
            Op::SetEol { crlf } => {
                let eol = if *crlf { EndOfLine::Crlf } else { EndOfLine::Lf };
                buf.set_eol(eol);
                model = replace_eol(&model, eol.as_str());
            }
            Op::QueryLine { line } => {
                let line = (*line as usize) % (buf.line_count() + 2);
                let _ = buf.line_content(line);
                let _ = buf.line_length(line);
            }
            Op::Roundtrip { offset } => {
                let at = (*offset as usize) % (buf.len() + 1);
                let pos = buf.position_at(at);
                assert_eq!(buf.offset_at(pos.line, pos.column), at);
            }
        }

        assert_eq!(buf.lines_raw_content(), model);
        buf.check_invariants().expect("tree invariants violated");
    }
});

fn replace_eol(text: &str, eol: &str) -> String {
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
