//! End-to-end scenarios for the piece-tree buffer.
//!
//! Each test drives the public builder + buffer API the way an editor
//! would: streamed chunks in, edits, then line/offset queries out.

use piecebuf::{EndOfLine, TextBuffer, TextBufferBuilder};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn build_chunks(chunks: &[&str], normalize: bool, default_eol: EndOfLine) -> TextBuffer {
    let mut builder = TextBufferBuilder::new();
    for chunk in chunks {
        builder.accept_chunk(chunk);
    }
    builder.finish(normalize).create(default_eol)
}

#[test]
fn scenario_append_then_split() {
    init_tracing();
    let mut buf = build_chunks(&["abc\n", "def"], true, EndOfLine::Lf);

    assert_eq!(buf.len(), 7);
    assert_eq!(buf.line_count(), 2);
    assert_eq!(buf.line_content(1), "abc");
    assert_eq!(buf.line_content(2), "def");

    buf.insert(1, "+", false);
    assert_eq!(buf.len(), 8);
    assert_eq!(buf.lines_content(), vec!["a+bc", "def"]);

    buf.delete(2, 1);
    assert_eq!(buf.len(), 7);
    assert_eq!(buf.lines_content(), vec!["a+c", "def"]);

    buf.check_invariants().unwrap();
}

#[test]
fn scenario_crlf_repair_across_pieces() {
    init_tracing();
    let mut buf = build_chunks(&[], false, EndOfLine::Lf);

    buf.insert(0, "abc\r", false);
    buf.insert(4, "\ndef", false);

    assert_eq!(buf.line_count(), 2);
    assert_eq!(buf.line_content(1), "abc");
    assert_eq!(buf.line_content(2), "def");
    assert_eq!(buf.lines_raw_content(), "abc\r\ndef");
    buf.check_invariants().unwrap();
}

#[test]
fn scenario_large_input_chunking() {
    init_tracing();
    let mut line = "y".repeat(99);
    line.push('\n');
    let text = line.repeat(3072); // 300 KiB, a newline every 100 bytes
    assert_eq!(text.len(), 307_200);

    let mut buf = build_chunks(&["seed\n"], true, EndOfLine::Lf);
    let initial_lines = buf.line_count();

    buf.insert(5, &text, false);
    assert_eq!(buf.len(), 5 + 307_200);
    assert_eq!(buf.line_count(), initial_lines + 3072);
    assert!(
        buf.piece_count() >= 5,
        "300 KiB must spread over multiple 64 KiB buffers, got {} pieces",
        buf.piece_count()
    );

    // Offset <-> position stays consistent to the last byte.
    for offset in [0, 1, 5, 104, 307_000, buf.len() - 1, buf.len()] {
        let pos = buf.position_at(offset);
        assert_eq!(buf.offset_at(pos.line, pos.column), offset, "at {offset}");
    }
    buf.check_invariants().unwrap();
}

#[test]
fn scenario_eol_normalization() {
    init_tracing();

    // CR-flavoured terminators dominate (one CRLF + one lone CR of three),
    // so the factory elects CRLF and normalizes everything to it.
    let buf = build_chunks(&["a\r\nb\nc\rd"], true, EndOfLine::Lf);
    assert_eq!(buf.eol(), EndOfLine::Crlf);
    assert!(buf.is_eol_normalized());
    assert_eq!(buf.lines_raw_content(), "a\r\nb\r\nc\r\nd");
    assert_eq!(buf.line_count(), 4);

    // With an LF majority the default-LF creation normalizes to LF.
    let buf = build_chunks(&["a\r\nb\nc\nd"], true, EndOfLine::Lf);
    assert_eq!(buf.eol(), EndOfLine::Lf);
    assert!(buf.is_eol_normalized());
    assert_eq!(buf.lines_raw_content(), "a\nb\nc\nd");
    assert_eq!(buf.line_count(), 4);
}

#[test]
fn scenario_structural_equality() {
    init_tracing();
    let mut a = build_chunks(&["hello", " world"], true, EndOfLine::Lf);
    let mut b = build_chunks(&["hello", " world"], true, EndOfLine::Lf);

    assert_eq!(a, b);
    assert_eq!(a.snapshot("").read(), b.snapshot("").read());

    a.insert(5, " there", false);
    assert_ne!(a, b);

    b.insert(5, " there", false);
    assert_eq!(a, b);
}

#[test]
fn scenario_cross_node_delete() {
    init_tracing();
    let mut buf = build_chunks(&["Hello"], false, EndOfLine::Lf);
    buf.insert(5, "World", false);
    buf.insert(5, ", ", false);
    assert_eq!(buf.lines_raw_content(), "Hello, World");

    buf.delete(5, 2);
    assert_eq!(buf.lines_raw_content(), "HelloWorld");
    assert_eq!(buf.len(), 10);
    assert_eq!(buf.line_count(), 1);
    buf.check_invariants().unwrap();
}

// ---------------------------------------------------------------------
// Idempotence and round-trip laws
// ---------------------------------------------------------------------

#[test]
fn law_noop_edits() {
    let mut buf = build_chunks(&["abc\ndef"], false, EndOfLine::Lf);
    let before = buf.snapshot("");

    buf.insert(3, "", false);
    buf.delete(3, 0);
    buf.delete(999, 1);

    assert_eq!(buf.snapshot("").read(), before.read());
    buf.check_invariants().unwrap();
}

#[test]
fn law_insert_delete_restores() {
    let mut buf = build_chunks(&["line one\nline two\r\nline three"], false, EndOfLine::Lf);
    let before = buf.snapshot("");

    for (offset, text) in [(0, "head"), (9, "mid\r\n"), (28, "tail")] {
        buf.insert(offset, text, false);
        buf.delete(offset, text.len());
        assert_eq!(buf.snapshot("").read(), before.read(), "at {offset}");
        buf.check_invariants().unwrap();
    }
}

#[test]
fn law_offset_position_roundtrip() {
    let mut buf = build_chunks(&["abc\ndef\r\nghi\rjkl"], false, EndOfLine::Lf);
    buf.insert(4, "0123\n45", false);
    buf.delete(1, 2);

    for offset in 0..=buf.len() {
        let pos = buf.position_at(offset);
        assert_eq!(
            buf.offset_at(pos.line, pos.column),
            offset,
            "roundtrip failed at offset {offset} -> {pos:?}"
        );
    }
}

#[test]
fn law_snapshot_stable_across_clone() {
    let buf = build_chunks(&["alpha\nbeta"], true, EndOfLine::Lf);
    let snap = buf.snapshot("");

    let clone = buf.clone();
    assert_eq!(clone.snapshot("").read(), snap.read());

    let mut edited = buf.clone();
    edited.insert(0, "x", false);
    assert_eq!(snap.read(), "alpha\nbeta");
    assert_eq!(buf.snapshot("").read(), "alpha\nbeta");
}

#[test]
fn law_set_eol_contract() {
    let mut buf = build_chunks(&["a\nb\r\nc\rd"], false, EndOfLine::Lf);
    assert!(!buf.is_eol_normalized());

    buf.set_eol(EndOfLine::Crlf);
    assert!(buf.is_eol_normalized());
    assert_eq!(buf.eol(), EndOfLine::Crlf);
    let raw = buf.lines_raw_content();
    assert_eq!(raw.matches("\r\n").count(), 3);
    assert_eq!(raw.matches('\r').count(), 3, "no lone \\r may remain");
    assert_eq!(raw.matches('\n').count(), 3, "no lone \\n may remain");

    buf.set_eol(EndOfLine::Lf);
    assert_eq!(buf.lines_raw_content(), "a\nb\nc\nd");
    assert!(buf.is_eol_normalized());
    buf.check_invariants().unwrap();
}

// ---------------------------------------------------------------------
// Boundary behaviors
// ---------------------------------------------------------------------

#[test]
fn boundary_builder_carries_split_crlf() {
    let buf = build_chunks(&["one\r", "\ntwo\r", "\nthree"], false, EndOfLine::Lf);
    assert_eq!(buf.eol(), EndOfLine::Crlf);
    assert_eq!(buf.line_count(), 3);
    assert_eq!(buf.lines_content(), vec!["one", "two", "three"]);
}

#[test]
fn boundary_insert_at_piece_seam() {
    let mut buf = build_chunks(&["ab\r\ncd"], false, EndOfLine::Lf);
    buf.insert(4, "mid", false);
    assert_eq!(buf.lines_raw_content(), "ab\r\nmidcd");
    assert_eq!(buf.line_count(), 2, "the CRLF must not be doubled");
    buf.check_invariants().unwrap();
}

#[test]
fn boundary_split_then_rejoin_crlf() {
    let mut buf = build_chunks(&["ab\r\ncd"], false, EndOfLine::Lf);
    buf.insert(3, "x", false);
    assert_eq!(buf.line_count(), 3);
    buf.delete(3, 1);
    assert_eq!(buf.lines_raw_content(), "ab\r\ncd");
    assert_eq!(buf.line_count(), 2);
    buf.check_invariants().unwrap();
}

#[test]
fn boundary_bom_round_trip() {
    let mut builder = TextBufferBuilder::new();
    builder.accept_chunk("\u{FEFF}content");
    let factory = builder.finish(false);
    let bom = factory.bom();
    assert_eq!(bom, "\u{FEFF}");

    let buf = factory.create(EndOfLine::Lf);
    assert_eq!(buf.lines_raw_content(), "content");
    assert_eq!(buf.snapshot(bom).read(), "\u{FEFF}content");
}

#[test]
fn boundary_reads_outside_are_empty() {
    let mut buf = build_chunks(&["abc"], false, EndOfLine::Lf);
    assert_eq!(buf.line_content(0), "");
    assert_eq!(buf.line_content(5), "");
    assert_eq!(buf.line_char_code(2, 1), None);
    assert_eq!(buf.line_length(9), 0);
    assert_eq!(buf.value_in_range(1, 1, 1, 1, None), "");
}

#[test]
fn heavy_mixed_editing_stays_consistent() {
    init_tracing();
    let mut buf = build_chunks(&["start\n"], true, EndOfLine::Lf);
    let mut model = String::from("start\n");

    let script: &[(bool, usize, &str, usize)] = &[
        (true, 0, "alpha ", 0),
        (true, 6, "beta\r\n", 0),
        (true, 3, "gamma", 0),
        (false, 2, "", 4),
        (true, 10, "\r\ndelta", 0),
        (false, 0, "", 3),
        (true, 8, "\n", 0),
        (false, 5, "", 6),
        (true, 1, "omega\r", 0),
        (true, 7, "\ntail", 0),
    ];

    for &(is_insert, offset, text, count) in script {
        if is_insert {
            let at = offset.min(model.len());
            model.insert_str(at, text);
            buf.insert(offset, text, false);
        } else {
            let at = offset.min(model.len());
            let n = count.min(model.len() - at);
            model.replace_range(at..at + n, "");
            buf.delete(offset, count);
        }

        assert_eq!(buf.lines_raw_content(), model);
        assert_eq!(buf.len(), model.len());
        buf.check_invariants().unwrap();
    }
}
