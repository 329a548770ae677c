use std::io;

use thiserror::Error;

use crate::Code;

/// The result of coding a whole stream through one of the stream adapters.
#[derive(Debug)]
pub struct AllResult {
    /// The total number of bytes consumed from the reader.
    pub bytes_read: usize,
    /// The total number of bytes written into the writer.
    pub bytes_written: usize,
    /// The final status of the coding operation.
    pub status: io::Result<()>,
}

/// Errors of the encoder and the decoder.
///
/// Errors reported while coding are fatal for the stream they occurred in. A failing sink may
/// have taken part of a string, a corrupt stream leaves the bit positions of all following codes
/// unknown, so the codec refuses any further work with `Poisoned`. `InvalidMaxCode` and
/// `Finished` are rejected before any state changes and do not poison.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LzwError {
    /// The decoder read a code that is neither assigned nor the one being assigned.
    #[error("invalid code {code} (next code is {next_code})")]
    InvalidCode { code: Code, next_code: Code },

    /// The input ended inside a code word.
    #[error("input ended inside a code word ({bits} bits left)")]
    TruncatedCode { bits: u8 },

    /// The bits padding a code word to a byte boundary were not all zero.
    #[error("non-zero padding before byte boundary")]
    InvalidPadding,

    /// A value handed to the bit writer does not fit its declared width.
    #[error("code {code} does not fit into {width} bits")]
    CodeOverflow { code: Code, width: u8 },

    /// The configured dictionary bound is out of range.
    #[error("maximum code {0} out of range, expected 0 or 257..=16777215")]
    InvalidMaxCode(Code),

    /// The encoder was asked for more data after it was finished.
    #[error("encoder already finished")]
    Finished,

    /// An earlier error left the codec out of sync with its stream.
    #[error("codec unusable after an earlier error")]
    Poisoned,

    /// The byte source or sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<LzwError> for io::Error {
    fn from(err: LzwError) -> Self {
        match err {
            LzwError::Io(err) => err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
