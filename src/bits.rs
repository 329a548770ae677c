//! Packing of variable width codes into bytes, most significant bit first.
use crate::error::LzwError;
use crate::port::{ByteSink, ByteSource};
use crate::{Code, MAX_CODESIZE};

/// Accumulates codes and emits every completed byte.
///
/// Between calls fewer than 8 bits are buffered, so a code of up to `MAX_CODESIZE` bits always
/// fits next to them.
#[derive(Debug, Default)]
pub(crate) struct BitWriter {
    /// The buffer bits, the valid ones are the lowest `bits`.
    buffer: u64,
    /// The number of valid buffer bits.
    bits: u8,
    /// Number of bytes handed to the sink.
    bytes_written: u64,
}

/// Collects bytes until a code of the requested width can be taken from the top.
#[derive(Debug, Default)]
pub(crate) struct BitReader {
    buffer: u64,
    bits: u8,
    /// Number of bytes taken from the source.
    bytes_read: u64,
}

impl BitWriter {
    pub(crate) fn new() -> Self {
        BitWriter::default()
    }

    /// Append `width` bits of `value` and emit all complete bytes.
    pub(crate) fn push(
        &mut self,
        value: Code,
        width: u8,
        sink: &mut impl ByteSink,
    ) -> Result<(), LzwError> {
        if width == 0 || width > MAX_CODESIZE || u64::from(value) >> width != 0 {
            return Err(LzwError::CodeOverflow { code: value, width });
        }

        self.buffer = (self.buffer << width) | u64::from(value);
        self.bits += width;
        self.push_out(sink)
    }

    /// Pad the buffered bits with zeros to the next byte boundary and emit that byte.
    ///
    /// Does nothing if no bits are buffered.
    pub(crate) fn flush(&mut self, sink: &mut impl ByteSink) -> Result<(), LzwError> {
        let to_byte = self.bits.wrapping_neg() & 0x7;
        self.buffer <<= to_byte;
        self.bits += to_byte;
        self.push_out(sink)
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn pending_bits(&self) -> u8 {
        self.bits
    }

    fn push_out(&mut self, sink: &mut impl ByteSink) -> Result<(), LzwError> {
        while self.bits >= 8 {
            let byte = (self.buffer >> (self.bits - 8)) as u8;
            sink.emit_byte(byte)?;
            self.bits -= 8;
            self.buffer &= mask(self.bits);
            self.bytes_written += 1;
        }
        Ok(())
    }
}

impl BitReader {
    pub(crate) fn new() -> Self {
        BitReader::default()
    }

    /// Take the next `width` bits.
    ///
    /// Returns `None` when the source ends first. The bits read so far stay buffered, a later
    /// call with a source that has more data continues the same code.
    pub(crate) fn pull(
        &mut self,
        width: u8,
        source: &mut impl ByteSource,
    ) -> Result<Option<Code>, LzwError> {
        debug_assert!(width > 0 && width <= MAX_CODESIZE);
        while self.bits < width {
            match source.read_byte()? {
                Some(byte) => {
                    self.buffer = (self.buffer << 8) | u64::from(byte);
                    self.bits += 8;
                    self.bytes_read += 1;
                }
                None => return Ok(None),
            }
        }

        let code = (self.buffer >> (self.bits - width)) as Code & mask(width) as Code;
        self.bits -= width;
        self.buffer &= mask(self.bits);
        Ok(Some(code))
    }

    /// Drop the bits up to the next byte boundary, they must be zero padding.
    pub(crate) fn align(&mut self) -> Result<(), LzwError> {
        let pad = self.bits % 8;
        if self.buffer >> (self.bits - pad) & mask(pad) != 0 {
            return Err(LzwError::InvalidPadding);
        }
        self.bits -= pad;
        self.buffer &= mask(self.bits);
        Ok(())
    }

    /// Check the leftover after the input ended.
    ///
    /// Only the final zero padding of less than a byte may remain. Afterwards the reader is
    /// empty.
    pub(crate) fn finish(&mut self) -> Result<(), LzwError> {
        let (buffer, bits) = (self.buffer, self.bits);
        self.buffer = 0;
        self.bits = 0;
        if bits >= 8 {
            Err(LzwError::TruncatedCode { bits })
        } else if buffer != 0 {
            Err(LzwError::InvalidPadding)
        } else {
            Ok(())
        }
    }

    pub(crate) fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

fn mask(bits: u8) -> u64 {
    (1u64 << bits) - 1
}
