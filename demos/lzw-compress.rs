//! Compresses the input from stdin and writes the result to stdout.
//!
//! An optional argument bounds the dictionary, the decompressor must be given the same bound.

use std::io::{self, BufWriter};

fn main() {
    match (|| -> Result<(), Box<dyn std::error::Error>> {
        let max_code = match std::env::args().nth(1) {
            Some(arg) => arg.parse()?,
            None => 0,
        };
        let mut encoder = lzwpage::Encoder::with_max_code(max_code)?;
        let stdin = io::stdin();
        let stdin = stdin.lock();
        let stdout = io::stdout();
        let stdout = BufWriter::new(stdout.lock());
        encoder.into_stream(stdout).encode_all(stdin).status?;
        Ok(())
    })() {
        Ok(()) => (),
        Err(err) => eprintln!("{}", err),
    }
}
