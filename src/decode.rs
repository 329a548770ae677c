//! A module for all decoding needs.
use std::io::{self, BufRead, Write};

use tracing::{debug, trace};

use crate::bits::BitReader;
use crate::dict::{Dictionary, Extend};
use crate::error::{AllResult, LzwError};
use crate::port::{ByteSink, ByteSource, SliceSource};
use crate::{validate_max_code, Code, CLEAR_CODE, STREAM_CHUNK};

#[cfg(feature = "async")]
use futures::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// The state of one decompressed stream.
///
/// The decoder rebuilds the encoder's dictionary one code behind it: each code adds the string of
/// the previous code extended by the first byte of its own string.
#[derive(Debug)]
pub struct Decoder {
    /// The table of decoded codes.
    dict: Dictionary,
    /// The bit buffer for decoding.
    buffer: BitReader,
    /// The code decoded last since the stream start or the last clear code.
    last: Option<Code>,
    /// The string of the code being emitted.
    scratch: Vec<u8>,
    /// Number of decoded bytes emitted.
    bytes_written: u64,
    has_ended: bool,
    /// An earlier call failed, the state is no longer in sync with the stream.
    failed: bool,
}

/// A decoding stream sink.
///
/// See [`Decoder::into_stream`] on how to create this type.
///
/// [`Decoder::into_stream`]: struct.Decoder.html#method.into_stream
pub struct IntoStream<'d, W> {
    decoder: &'d mut Decoder,
    writer: W,
}

/// An async decoding sink.
///
/// See [`Decoder::into_async`] on how to create this type.
///
/// [`Decoder::into_async`]: struct.Decoder.html#method.into_async
#[cfg(feature = "async")]
pub struct IntoAsync<'d, W> {
    decoder: &'d mut Decoder,
    writer: W,
}

impl Decoder {
    /// Create a decoder for a stream of an unbounded encoder.
    pub fn new() -> Self {
        Decoder::with_dictionary(Dictionary::new(0))
    }

    /// Create a decoder for a stream of an encoder created with the same `max_code`.
    pub fn with_max_code(max_code: Code) -> Result<Self, LzwError> {
        let max_code = validate_max_code(max_code)?;
        Ok(Decoder::with_dictionary(Dictionary::new(max_code)))
    }

    fn with_dictionary(dict: Dictionary) -> Self {
        Decoder {
            dict,
            buffer: BitReader::new(),
            last: None,
            scratch: Vec::new(),
            bytes_written: 0,
            has_ended: false,
            failed: false,
        }
    }

    /// Decode whole codes from `source` until at least `max_bytes` bytes were emitted.
    ///
    /// Any error, including one of `sink`, leaves the decoder unusable: later calls return
    /// [`LzwError::Poisoned`].
    ///
    /// Returns the number of bytes emitted into `sink`. It may exceed `max_bytes` by the length
    /// of the last string, codes are never split. A return value of 0 means the stream has ended
    /// (or `max_bytes` was 0). The end of `source` is taken as the end of the stream and checked
    /// with [`finish`].
    ///
    /// [`finish`]: #method.finish
    pub fn process_chunk(
        &mut self,
        mut source: impl ByteSource,
        mut sink: impl ByteSink,
        max_bytes: usize,
    ) -> Result<usize, LzwError> {
        self.check_usable()?;
        if self.has_ended {
            return Ok(0);
        }

        let mut produced = 0;
        while produced < max_bytes {
            match self.step(&mut source, &mut sink).map_err(|err| self.fail(err))? {
                Some(len) => produced += len,
                None => {
                    self.finish()?;
                    break;
                }
            }
        }

        Ok(produced)
    }

    /// Decode all complete codes of `inp`.
    ///
    /// Bits of a code that continues past the end of `inp` stay buffered for the next call. Call
    /// [`finish`] once there is no more input. Returns the number of bytes emitted.
    ///
    /// [`finish`]: #method.finish
    pub fn decode_bytes(&mut self, inp: &[u8], mut sink: impl ByteSink) -> Result<usize, LzwError> {
        self.check_usable()?;
        if self.has_ended {
            return Ok(0);
        }

        let mut source = SliceSource::new(inp);
        let mut produced = 0;
        while let Some(len) = self.step(&mut source, &mut sink).map_err(|err| self.fail(err))? {
            produced += len;
        }
        Ok(produced)
    }

    /// Declare the end of the input.
    ///
    /// The input must end on the padding after the last code: fewer than eight bits, all zero.
    pub fn finish(&mut self) -> Result<(), LzwError> {
        self.check_usable()?;
        if self.has_ended {
            return Ok(());
        }
        self.has_ended = true;
        self.buffer.finish().map_err(|err| self.fail(err))?;

        debug!(
            bytes_read = self.buffer.bytes_read(),
            bytes_written = self.bytes_written,
            "decoding finished"
        );
        Ok(())
    }

    /// Construct a decoder into a writer.
    pub fn into_stream<W: Write>(&mut self, writer: W) -> IntoStream<'_, W> {
        IntoStream { decoder: self, writer }
    }

    /// Construct a decoder into an async writer.
    #[cfg(feature = "async")]
    pub fn into_async<W: AsyncWrite>(&mut self, writer: W) -> IntoAsync<'_, W> {
        IntoAsync { decoder: self, writer }
    }

    /// If the end of the stream was reached.
    pub fn has_ended(&self) -> bool {
        self.has_ended
    }

    /// The number of compressed bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.buffer.bytes_read()
    }

    /// The number of decoded bytes emitted so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// The width of the next code read.
    pub fn code_width(&self) -> u8 {
        self.dict.code_width()
    }

    /// The dictionary as it was rebuilt so far.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
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

    /// Read and handle a single code.
    ///
    /// Returns the length of the emitted string, or `None` if the source ran dry first.
    fn step(
        &mut self,
        source: &mut impl ByteSource,
        sink: &mut impl ByteSink,
    ) -> Result<Option<usize>, LzwError> {
        let width = self.dict.code_width();
        let code = match self.buffer.pull(width, source)? {
            Some(code) => code,
            None => return Ok(None),
        };
        trace!(code, width, "read");

        if code == CLEAR_CODE {
            self.buffer.align()?;
            self.dict.reset();
            self.last = None;
            debug!(bytes_read = self.buffer.bytes_read(), "clear code received");
            return Ok(Some(0));
        }

        let next_code = self.dict.next_code();
        let invalid = LzwError::InvalidCode { code, next_code };
        let first = match self.last {
            _ if self.dict.is_assigned(code) => self.dict.first_byte(code),
            // The code the encoder assigned while emitting the previous one.
            Some(prev) if code == next_code && self.dict.can_grow() => self.dict.first_byte(prev),
            _ => return Err(invalid),
        };

        if let Some(prev) = self.last {
            match self.dict.extend(prev, first) {
                Extend::Inserted(_) | Extend::Full => {}
                // An encoder would have used the known code instead.
                Extend::Matched(_) => return Err(invalid),
            }
        }

        self.dict.reconstruct(code, &mut self.scratch);
        for &byte in &self.scratch {
            sink.emit_byte(byte)?;
        }
        let len = self.scratch.len();
        self.bytes_written += len as u64;

        // The encoder created its next entry while writing this code and widened before writing
        // the following one, so we must widen before reading it.
        let pending = self.dict.next_code() + Code::from(self.dict.can_grow());
        self.dict.grow_width(pending);

        self.last = Some(code);
        Ok(Some(len))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

impl<W: Write> IntoStream<'_, W> {
    /// Decode data from a reader until its end, which must also be the end of the stream.
    pub fn decode_all(self, mut read: impl BufRead) -> AllResult {
        let IntoStream { decoder, mut writer } = self;

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

                decoder.decode_bytes(data, &mut outbuf)?;
                read.consume(consumed);
                bytes_read += consumed;

                writer.write_all(&outbuf)?;
                bytes_written += outbuf.len();
                outbuf.clear();
            }

            decoder.finish()?;
            writer.flush()
        })();

        if status.is_err() {
            // Coded data may have been lost with the writer.
            decoder.failed = true;
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
    /// Decode data from a reader until its end, which must also be the end of the stream.
    pub async fn decode_all(self, read: impl AsyncBufRead) -> AllResult {
        let IntoAsync { decoder, mut writer } = self;
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

                decoder.decode_bytes(data, &mut outbuf)?;
                read.as_mut().consume(consumed);
                bytes_read += consumed;

                writer.write_all(&outbuf).await?;
                bytes_written += outbuf.len();
                outbuf.clear();
            }

            decoder.finish()?;
            writer.flush().await?;
            Ok::<(), io::Error>(())
        }
        .await;

        if status.is_err() {
            // Coded data may have been lost with the writer.
            decoder.failed = true;
        }

        AllResult {
            bytes_read,
            bytes_written,
            status,
        }
    }
}
