//! Byte level ports through which the codec reads and emits data.
//!
//! The encoder and decoder never own their input or output. Each call borrows a [`ByteSource`]
//! and a [`ByteSink`], so the same codec state can be fed from memory, from a file, or from a
//! test double, and the caller decides when and how much to process.
use std::io::{self, BufRead, Write};

/// A source of single bytes.
pub trait ByteSource {
    /// Read the next byte, `None` signals the end of the input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

/// A sink of single bytes.
pub trait ByteSink {
    /// Emit one byte.
    fn emit_byte(&mut self, byte: u8) -> io::Result<()>;
}

/// Reads bytes from an in-memory slice.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    position: usize,
}

/// Reads bytes from a buffered reader, such as an opened file or stdin.
#[derive(Debug)]
pub struct IoSource<R> {
    reader: R,
}

/// Writes bytes into a writer.
///
/// Every byte is handed to the writer individually, wrap unbuffered writers in a
/// [`std::io::BufWriter`].
#[derive(Debug)]
pub struct IoSink<W> {
    writer: W,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data, position: 0 }
    }

    /// The number of bytes handed out so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The bytes not yet read.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.data.get(self.position).copied();
        if byte.is_some() {
            self.position += 1;
        }
        Ok(byte)
    }
}

impl<R: BufRead> IoSource<R> {
    pub fn new(reader: R) -> Self {
        IoSource { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> ByteSource for IoSource<R> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = loop {
            match self.reader.fill_buf() {
                Ok(buf) => break buf.first().copied(),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        };
        if byte.is_some() {
            self.reader.consume(1);
        }
        Ok(byte)
    }
}

impl<W: Write> IoSink<W> {
    pub fn new(writer: W) -> Self {
        IoSink { writer }
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ByteSink for IoSink<W> {
    fn emit_byte(&mut self, byte: u8) -> io::Result<()> {
        self.writer.write_all(&[byte])
    }
}

impl ByteSink for Vec<u8> {
    fn emit_byte(&mut self, byte: u8) -> io::Result<()> {
        self.push(byte);
        Ok(())
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &'_ mut S {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &'_ mut S {
    fn emit_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).emit_byte(byte)
    }
}
