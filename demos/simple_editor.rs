//! Minimal line-oriented editor driving the buffer API.
//!
//! Run with `cargo run --example simple_editor`, then type commands:
//!
//! ```text
//! insert <pos> <text>    insert text at a byte offset
//! delete <start> <end>   delete the byte range [start, end)
//! line <n>               print one line
//! print                  print the whole buffer with line numbers
//! stats                  length, line count, pieces, EOL
//! exit                   quit
//! ```

use std::io::{self, BufRead, Write};

use piecebuf::{EndOfLine, TextBufferBuilder};

fn main() -> io::Result<()> {
    tracing_subscriber_init();

    let mut builder = TextBufferBuilder::new();
    builder.accept_chunk("Welcome to the piecebuf example!\n");
    builder.accept_chunk("Edit the buffer with insert/delete, inspect it with line/print/stats.\n");
    let mut buf = builder.finish(true).create(EndOfLine::Lf);

    print!("{}", buf.lines_raw_content());

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let args: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = args.first() else {
            continue;
        };

        match command {
            "insert" if args.len() >= 3 => {
                let Ok(pos) = args[1].parse::<usize>() else {
                    println!("Usage: insert <pos> <text>");
                    continue;
                };
                let text = args[2..].join(" ");
                buf.insert(pos, &text, false);
                println!("Inserted {} bytes.", text.len());
            }
            "delete" if args.len() >= 3 => {
                let (Ok(start), Ok(end)) = (args[1].parse::<usize>(), args[2].parse::<usize>())
                else {
                    println!("Usage: delete <start> <end>");
                    continue;
                };
                buf.delete(start, end.saturating_sub(start));
                println!("Deleted.");
            }
            "line" if args.len() >= 2 => {
                let Ok(n) = args[1].parse::<usize>() else {
                    println!("Usage: line <n>");
                    continue;
                };
                println!("{}", buf.line_content(n));
            }
            "print" => {
                for (i, line) in buf.lines_content().into_iter().enumerate() {
                    println!("{:>4} | {line}", i + 1);
                }
            }
            "stats" => {
                println!(
                    "{} bytes, {} lines, {} pieces, eol {:?}",
                    buf.len(),
                    buf.line_count(),
                    buf.piece_count(),
                    buf.eol()
                );
            }
            "exit" | "quit" => break,
            _ => println!("Commands: insert, delete, line, print, stats, exit"),
        }
    }

    Ok(())
}

fn tracing_subscriber_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
