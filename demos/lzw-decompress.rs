//! Decompresses the input from stdin and writes the result to stdout.
//!
//! An optional argument gives the dictionary bound the stream was compressed with.

use std::io::{self, BufWriter};

fn main() {
    match (|| -> Result<(), Box<dyn std::error::Error>> {
        let max_code = match std::env::args().nth(1) {
            Some(arg) => arg.parse()?,
            None => 0,
        };
        let mut decoder = lzwpage::Decoder::with_max_code(max_code)?;
        let stdout = io::stdout();
        let stdout = BufWriter::new(stdout.lock());
        let stdin = io::stdin();
        let stdin = stdin.lock();
        decoder.into_stream(stdout).decode_all(stdin).status?;
        Ok(())
    })() {
        Ok(()) => (),
        Err(err) => eprintln!("{}", err),
    }
}
