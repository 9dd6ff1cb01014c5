//! Piece-tree buffer performance benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use piecebuf::{EndOfLine, TextBuffer, TextBufferBuilder};
use std::hint::black_box;

fn build(text: &str) -> TextBuffer {
    let mut builder = TextBufferBuilder::new();
    builder.accept_chunk(text);
    builder.finish(true).create(EndOfLine::Lf)
}

fn buffer_creation(c: &mut Criterion) {
    c.bench_function("build_short", |b| {
        b.iter(|| build(black_box("Hello, World!")));
    });

    let mut line = "x".repeat(79);
    line.push('\n');
    let large = line.repeat(12_800); // ~1 MiB
    c.bench_function("build_1mib", |b| {
        b.iter(|| build(black_box(&large)));
    });

    c.bench_function("build_chunked_1mib", |b| {
        b.iter(|| {
            let mut builder = TextBufferBuilder::new();
            for chunk in large.as_bytes().chunks(4096) {
                builder.accept_chunk(std::str::from_utf8(chunk).unwrap());
            }
            builder.finish(true).create(EndOfLine::Lf)
        });
    });
}

fn sequential_typing(c: &mut Criterion) {
    c.bench_function("typing_append", |b| {
        let mut buf = build("");
        let mut offset = 0;
        b.iter(|| {
            buf.insert(offset, black_box("x"), true);
            offset += 1;
        });
    });

    c.bench_function("typing_lines", |b| {
        let mut buf = build("");
        let mut offset = 0;
        b.iter(|| {
            buf.insert(offset, black_box("one more line\n"), true);
            offset += 14;
        });
    });
}

fn scattered_edits(c: &mut Criterion) {
    let mut line = "x".repeat(79);
    line.push('\n');
    let base = line.repeat(1280); // ~100 KiB

    c.bench_function("scattered_insert", |b| {
        let mut buf = build(&base);
        let mut at = 7;
        b.iter(|| {
            buf.insert(at % buf.len(), black_box("y"), true);
            at = at.wrapping_mul(31).wrapping_add(17);
        });
    });

    c.bench_function("scattered_delete", |b| {
        let mut buf = build(&base);
        let mut at = 7;
        b.iter(|| {
            if buf.len() < 2 {
                buf.insert(0, &base, true);
            }
            buf.delete(at % (buf.len() - 1), 1);
            at = at.wrapping_mul(31).wrapping_add(17);
        });
    });
}

fn queries(c: &mut Criterion) {
    let mut line = "x".repeat(79);
    line.push('\n');
    let base = line.repeat(1280);
    let mut buf = build(&base);
    // Fragment the tree a little so descents do real work.
    for i in 0..200 {
        buf.insert((i * 509) % buf.len(), "y", true);
    }
    let lines = buf.line_count();
    let len = buf.len();

    c.bench_function("query_line_content", |b| {
        let mut n = 1;
        b.iter(|| {
            let content = buf.line_content(n % lines + 1);
            n += 7;
            black_box(content)
        });
    });

    c.bench_function("query_position_at", |b| {
        let mut offset = 0;
        b.iter(|| {
            let pos = buf.position_at(offset % len);
            offset += 4099;
            black_box(pos)
        });
    });

    c.bench_function("query_offset_at", |b| {
        let mut n = 1;
        b.iter(|| {
            let offset = buf.offset_at(n % lines + 1, 5);
            n += 7;
            black_box(offset)
        });
    });

    c.bench_function("query_snapshot", |b| {
        b.iter(|| black_box(buf.snapshot("")));
    });
}

criterion_group!(
    benches,
    buffer_creation,
    sequential_typing,
    scattered_edits,
    queries
);
criterion_main!(benches);
