//! A module for all encoding needs.
use std::io::{self, BufRead, Write};

use tracing::{debug, trace};

use crate::bits::BitWriter;
use crate::dict::{Dictionary, Extend, ROOT};
use crate::error::{AllResult, LzwError};
use crate::port::{ByteSink, ByteSource, SliceSource};
use crate::{validate_max_code, Code, CLEAR_CODE, STREAM_CHUNK};

#[cfg(feature = "async")]
use futures::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// The state of one compressed stream.
///
/// Bytes are fed in chunks with [`process_chunk`] (or [`encode_bytes`]) and the code stream is
/// completed with [`finish`]. Between chunks the encoder may be asked to reset both dictionaries
/// with [`emit_clear_code`].
///
/// [`process_chunk`]: #method.process_chunk
/// [`encode_bytes`]: #method.encode_bytes
/// [`finish`]: #method.finish
/// [`emit_clear_code`]: #method.emit_clear_code
#[derive(Debug)]
pub struct Encoder {
    /// The current encoding symbol tree.
    dict: Dictionary,
    /// The code corresponding to the currently read characters, `ROOT` when none were read.
    current_code: Code,
    /// The bit buffer for encoding.
    buffer: BitWriter,
    /// Number of input bytes consumed.
    bytes_read: u64,
    /// If a source reported the end of its data.
    input_exhausted: bool,
    /// If the final code and padding have been written.
    has_ended: bool,
    /// An earlier call failed, the state is no longer in sync with the stream.
    failed: bool,
}

/// A encoding stream sink.
///
/// See [`Encoder::into_stream`] on how to create this type and more information.
///
/// [`Encoder::into_stream`]: struct.Encoder.html#method.into_stream
pub struct IntoStream<'d, W> {
    encoder: &'d mut Encoder,
    writer: W,
}

/// An async encoding sink.
///
/// See [`Encoder::into_async`] on how to create this type.
///
/// [`Encoder::into_async`]: struct.Encoder.html#method.into_async
#[cfg(feature = "async")]
pub struct IntoAsync<'d, W> {
    encoder: &'d mut Encoder,
    writer: W,
}

impl Encoder {
    /// Create an encoder whose dictionary grows until codes are `MAX_CODESIZE` bits wide.
    pub fn new() -> Self {
        Encoder::with_dictionary(Dictionary::new(0))
    }

    /// Create an encoder that assigns no code at or above `max_code`.
    ///
    /// Once the dictionary is full the encoder keeps matching against the strings it knows. A
    /// `max_code` of 0 is the same as [`Encoder::new`], values `1..=256` leave no room for the
    /// reserved codes and are rejected, as are codes wider than `MAX_CODESIZE`.
    pub fn with_max_code(max_code: Code) -> Result<Self, LzwError> {
        let max_code = validate_max_code(max_code)?;
        Ok(Encoder::with_dictionary(Dictionary::new(max_code)))
    }

    fn with_dictionary(dict: Dictionary) -> Self {
        Encoder {
            dict,
            current_code: ROOT,
            buffer: BitWriter::new(),
            bytes_read: 0,
            input_exhausted: false,
            has_ended: false,
            failed: false,
        }
    }

    /// Consume up to `max_bytes` bytes from `source`, writing finished codes to `sink`.
    ///
    /// Returns the number of bytes consumed. A return value of 0 means the source is exhausted
    /// (or `max_bytes` was 0). The longest match found so far stays pending across calls, so the
    /// produced stream does not depend on how the input is split into chunks.
    ///
    /// Any error, including one of `source` or `sink`, leaves the encoder unusable: later calls
    /// return [`LzwError::Poisoned`].
    pub fn process_chunk(
        &mut self,
        mut source: impl ByteSource,
        mut sink: impl ByteSink,
        max_bytes: usize,
    ) -> Result<usize, LzwError> {
        self.check_usable()?;
        if self.has_ended {
            return Err(LzwError::Finished);
        }

        let mut consumed = 0;
        while consumed < max_bytes {
            let byte = match source.read_byte().map_err(|err| self.fail(err.into()))? {
                Some(byte) => byte,
                None => {
                    self.input_exhausted = true;
                    break;
                }
            };
            consumed += 1;
            self.bytes_read += 1;
            self.input_exhausted = false;
            self.advance(byte, &mut sink).map_err(|err| self.fail(err))?;
        }

        Ok(consumed)
    }

    /// Encode all of `inp`.
    ///
    /// Unlike reaching the end of a source in [`process_chunk`] this does not mark the input as
    /// exhausted, more data may follow in the next call.
    ///
    /// [`process_chunk`]: #method.process_chunk
    pub fn encode_bytes(&mut self, inp: &[u8], sink: impl ByteSink) -> Result<(), LzwError> {
        let consumed = self.process_chunk(SliceSource::new(inp), sink, inp.len())?;
        debug_assert_eq!(consumed, inp.len());
        Ok(())
    }

    /// Write the pending code and pad the stream to a full byte.
    ///
    /// Calling this again has no effect. Afterwards no more data can be encoded.
    pub fn finish(&mut self, mut sink: impl ByteSink) -> Result<(), LzwError> {
        self.check_usable()?;
        if self.has_ended {
            return Ok(());
        }

        self.write_tail(&mut sink).map_err(|err| self.fail(err))?;
        self.has_ended = true;

        debug!(
            bytes_read = self.bytes_read,
            bytes_written = self.buffer.bytes_written(),
            "encoding finished"
        );
        Ok(())
    }

    /// Reset the dictionary on both ends of the stream.
    ///
    /// The pending code is written, then the clear code, then the stream is padded to a full
    /// byte. Encoding continues with a fresh dictionary. Has no effect after the encoder finished,
    /// or when the last call to [`process_chunk`] reached the end of its source and no byte was
    /// consumed since.
    ///
    /// [`process_chunk`]: #method.process_chunk
    pub fn emit_clear_code(&mut self, mut sink: impl ByteSink) -> Result<(), LzwError> {
        self.check_usable()?;
        if self.has_ended || self.input_exhausted {
            return Ok(());
        }

        self.write_clear(&mut sink).map_err(|err| self.fail(err))?;
        debug!(bytes_written = self.buffer.bytes_written(), "clear code emitted");
        Ok(())
    }

    fn write_tail(&mut self, sink: &mut impl ByteSink) -> Result<(), LzwError> {
        if self.current_code != ROOT {
            self.emit(self.current_code, sink)?;
            self.current_code = ROOT;
        }
        self.buffer.flush(sink)
    }

    fn write_clear(&mut self, sink: &mut impl ByteSink) -> Result<(), LzwError> {
        if self.current_code != ROOT {
            self.emit(self.current_code, sink)?;
            self.current_code = ROOT;
            // The decoder widens after this code as if it had learned the following entry.
            let pending = self.dict.next_code() + Code::from(self.dict.can_grow());
            self.dict.grow_width(pending);
        }

        self.emit(CLEAR_CODE, sink)?;
        self.buffer.flush(sink)?;
        self.dict.reset();
        Ok(())
    }

    fn check_usable(&self) -> Result<(), LzwError> {
        if self.failed {
            Err(LzwError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Remember that `err` left the state out of sync with the stream.
    fn fail(&mut self, err: LzwError) -> LzwError {
        self.failed = true;
        err
    }

    /// Construct an encoder into a writer.
    pub fn into_stream<W: Write>(&mut self, writer: W) -> IntoStream<'_, W> {
        IntoStream { encoder: self, writer }
    }

    /// Construct an encoder into an async writer.
    #[cfg(feature = "async")]
    pub fn into_async<W: AsyncWrite>(&mut self, writer: W) -> IntoAsync<'_, W> {
        IntoAsync { encoder: self, writer }
    }

    /// The number of input bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// The number of compressed bytes produced so far.
    pub fn bytes_written(&self) -> u64 {
        self.buffer.bytes_written()
    }

    /// The width of the next code written.
    pub fn code_width(&self) -> u8 {
        self.dict.code_width()
    }

    /// The dictionary as it was built so far.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// If the final code and padding have been written.
    pub fn has_ended(&self) -> bool {
        self.has_ended
    }

    fn advance(&mut self, byte: u8, sink: &mut impl ByteSink) -> Result<(), LzwError> {
        match self.dict.extend(self.current_code, byte) {
            Extend::Matched(code) => self.current_code = code,
            outcome => {
                // The root knows every byte, so we never get here without a match.
                debug_assert_ne!(self.current_code, ROOT);
                self.emit(self.current_code, sink)?;
                if let Extend::Inserted(_) = outcome {
                    self.dict.grow_width(self.dict.next_code());
                }
                self.current_code = Code::from(byte);
            }
        }
        Ok(())
    }

    fn emit(&mut self, code: Code, sink: &mut impl ByteSink) -> Result<(), LzwError> {
        let width = self.dict.code_width();
        trace!(code, width, "emit");
        self.buffer.push(code, width, sink)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new()
    }
}

impl<W: Write> IntoStream<'_, W> {
    /// Encode data from a reader.
    ///
    /// This will drain the supplied reader. It will not write the final code, more data may
    /// be encoded afterwards.
    pub fn encode(&mut self, read: impl BufRead) -> AllResult {
        self.encode_part(read, false)
    }

    /// Encode data from a reader and finish the stream.
    pub fn encode_all(mut self, read: impl BufRead) -> AllResult {
        self.encode_part(read, true)
    }

    fn encode_part(&mut self, mut read: impl BufRead, finish: bool) -> AllResult {
        let IntoStream { encoder, writer } = self;

        let mut bytes_read = 0;
        let mut bytes_written = 0;
        let mut outbuf = Vec::with_capacity(STREAM_CHUNK);

        let status = (|| -> io::Result<()> {
            loop {
                let data = read.fill_buf()?;
                if data.is_empty() {
                    break;
                }
                let data = &data[..data.len().min(STREAM_CHUNK)];
                let consumed = data.len();

                encoder.encode_bytes(data, &mut outbuf)?;
                read.consume(consumed);
                bytes_read += consumed;

                writer.write_all(&outbuf)?;
                bytes_written += outbuf.len();
                outbuf.clear();
            }

            if finish {
                encoder.finish(&mut outbuf)?;
                writer.write_all(&outbuf)?;
                bytes_written += outbuf.len();
            }

            writer.flush()
        })();

        if status.is_err() {
            // Coded data may have been lost with the writer.
            encoder.failed = true;
        }

        AllResult {
            bytes_read,
            bytes_written,
            status,
        }
    }
}

#[cfg(feature = "async")]
impl<W: AsyncWrite + Unpin> IntoAsync<'_, W> {
    /// Encode data from a reader.
    ///
    /// This will drain the supplied reader. It will not write the final code, more data may
    /// be encoded afterwards.
    pub async fn encode(&mut self, read: impl AsyncBufRead) -> AllResult {
        self.encode_part(read, false).await
    }

    /// Encode data from a reader and finish the stream.
    pub async fn encode_all(mut self, read: impl AsyncBufRead) -> AllResult {
        self.encode_part(read, true).await
    }

    async fn encode_part(&mut self, read: impl AsyncBufRead, finish: bool) -> AllResult {
        let IntoAsync { encoder, writer } = self;
        futures::pin_mut!(read);

        let mut bytes_read = 0;
        let mut bytes_written = 0;
        let mut outbuf = Vec::with_capacity(STREAM_CHUNK);

        let status = async {
            loop {
                let data = read.fill_buf().await?;
                if data.is_empty() {
                    break;
                }
                let data = &data[..data.len().min(STREAM_CHUNK)];
                let consumed = data.len();

                encoder.encode_bytes(data, &mut outbuf)?;
                read.as_mut().consume(consumed);
                bytes_read += consumed;

                writer.write_all(&outbuf).await?;
                bytes_written += outbuf.len();
                outbuf.clear();
            }

            if finish {
                encoder.finish(&mut outbuf)?;
                writer.write_all(&outbuf).await?;
                bytes_written += outbuf.len();
            }

            writer.flush().await?;
            Ok::<(), io::Error>(())
        }
        .await;

        if status.is_err() {
            // Coded data may have been lost with the writer.
            encoder.failed = true;
        }

        AllResult {
            bytes_read,
            bytes_written,
            status,
        }
    }
}
