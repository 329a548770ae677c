//! # LZW decoder and encoder
//!
//! This crate provides an [`Encoder`] and a [`Decoder`] for a raw LZW code stream. There is no
//! header, no checksum and no end code: the stream is a sequence of code words written most
//! significant bit first, with a final zero pad to the next byte boundary.
//!
//! * Codes `0..=255` are the single byte strings.
//! * `CLEAR_CODE == 256` resets both dictionaries mid-stream and is never data.
//! * Codes start with a width of 9 bits and grow by exactly one bit whenever the next code to be
//!   assigned no longer fits. The width only shrinks through a clear code.
//!
//! Both sides are driven incrementally, in chunks, through byte level ports ([`ByteSource`] and
//! [`ByteSink`]) so that compression can be interleaved with other work such as measuring the
//! compression ratio from [`Encoder::bytes_read`] and [`Encoder::bytes_written`].
//!
//! Exemplary use of the encoder:
//!
//! ```
//! use lzwpage::{decode::Decoder, encode::Encoder};
//! let data = b"TOBEORNOTTOBEORTOBEORNOT";
//! let mut compressed = vec![];
//!
//! let mut enc = Encoder::new();
//! let result = enc.into_stream(&mut compressed).encode_all(&data[..]);
//! result.status.unwrap();
//!
//! let mut decompressed = vec![];
//! let mut dec = Decoder::new();
//! let result = dec.into_stream(&mut decompressed).decode_all(&compressed[..]);
//! result.status.unwrap();
//! assert_eq!(decompressed, data);
//! ```
#![forbid(unsafe_code)]

/// The reserved code that resets the dictionary.
pub const CLEAR_CODE: Code = 256;
/// The code width right after the dictionary was (re-)initialized.
pub const MIN_CODESIZE: u8 = 9;
/// The widest code the bit stream ever carries.
pub const MAX_CODESIZE: u8 = 24;

/// The highest value `next_code` may reach. Keeping it below `1 << MAX_CODESIZE` bounds the
/// code width by `MAX_CODESIZE`.
pub(crate) const CODE_LIMIT: Code = (1 << MAX_CODESIZE) - 1;

/// Number of input bytes handled per call by the stream adapters.
pub(crate) const STREAM_CHUNK: usize = 1 << 16;

/// Alias for a LZW code point
pub type Code = u32;

mod bits;
pub mod decode;
pub mod dict;
pub mod encode;
mod error;
pub mod port;

pub use crate::decode::Decoder;
pub use crate::encode::Encoder;
pub use crate::error::{AllResult, LzwError};
pub use crate::port::{ByteSink, ByteSource, IoSink, IoSource, SliceSource};

/// Check a user supplied dictionary bound.
///
/// `0` means unbounded. Otherwise the bound must leave room for the 256 literals and the clear
/// code and must keep every code representable in `MAX_CODESIZE` bits.
pub(crate) fn validate_max_code(max_code: Code) -> Result<Code, LzwError> {
    match max_code {
        0 => Ok(0),
        m if m <= CLEAR_CODE || m > CODE_LIMIT => Err(LzwError::InvalidMaxCode(m)),
        m => Ok(m),
    }
}
