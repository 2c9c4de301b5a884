//! Codec-level error types.

use std::fmt;

pub use crate::encryption::CryptoError;

/// A protocol-level framing or token-alphabet violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamError {
    /// A list-start byte was neither `0x00`, `0xF8`, nor `0xF9`.
    UnknownListStartToken(u8),
    /// A string-slot leader byte was not in the known alphabet.
    UnknownStringToken(u8),
    /// The frame header declared a length the buffer cannot satisfy even
    /// after the header is consumed (this should never reach the caller —
    /// it signals a reader bug, since callers only get frames once complete).
    FrameLengthExceedsBuffer { declared: usize, available: usize },
    /// The peer closed the stream gracefully (top-level token `0x02`).
    EndOfStream,
    /// The peer reported a fatal `stream:error` stanza.
    Remote(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownListStartToken(b) => write!(f, "unknown list-start token: {b:#04x}"),
            Self::UnknownStringToken(b) => write!(f, "unknown string token: {b:#04x}"),
            Self::FrameLengthExceedsBuffer { declared, available } => write!(
                f,
                "frame declares {declared} payload bytes but only {available} are buffered"
            ),
            Self::EndOfStream => write!(f, "remote closed the stream"),
            Self::Remote(reason) => write!(f, "stream:error received: {reason}"),
        }
    }
}

impl std::error::Error for StreamError {}

/// A malformed payload that was declared (or assumed) textual but is not
/// valid UTF-8, or a cipher MAC failure encountered while decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// A bytes slot that the caller treated as text was not valid UTF-8.
    InvalidUtf8,
    /// The encrypted-frame inner payload failed to authenticate.
    Crypto(CryptoError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 => write!(f, "bytes slot declared textual is not valid UTF-8"),
            Self::Crypto(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<CryptoError> for DecodeError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

/// The union of everything that can go wrong while pulling one frame off
/// the wire: a framing/token violation, or a decode-level failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderError {
    Stream(StreamError),
    Decode(DecodeError),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(e) => write!(f, "{e}"),
            Self::Decode(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReaderError {}

impl From<StreamError> for ReaderError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<DecodeError> for ReaderError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<CryptoError> for ReaderError {
    fn from(e: CryptoError) -> Self {
        Self::Decode(DecodeError::Crypto(e))
    }
}
