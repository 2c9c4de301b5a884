//! Session-level error types.

use std::{fmt, io};

use wirenode_core::{DecodeError, StreamError};

// ─── ConnectionError ──────────────────────────────────────────────────────────

/// Socket-level failure: connect refused, EOF mid-stream, write failure.
#[derive(Debug)]
pub enum ConnectionError {
    /// The underlying I/O operation failed.
    Io(io::Error),
    /// The remote party closed the socket.
    Closed,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Closed => write!(f, "socket closed by remote party"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<io::Error> for ConnectionError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ─── LoginError ───────────────────────────────────────────────────────────────

/// Authentication-level failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginError {
    /// The server rejected the number/secret pair with a `failure` stanza.
    AuthFailed,
    /// The account was reported `status="expired"` on an otherwise
    /// successful login.
    Expired,
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthFailed => write!(f, "incorrect number and/or secret"),
            Self::Expired => write!(f, "account marked as expired"),
        }
    }
}

impl std::error::Error for LoginError {}

// ─── ArgumentError ────────────────────────────────────────────────────────────

/// An invalid argument passed to a convenience sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentError {
    /// A chat-state value outside the known five (`active`, `inactive`,
    /// `composing`, `paused`, `gone`).
    InvalidChatState(String),
    /// An audio attribute key outside the fixed whitelist.
    UnknownAudioAttribute(String),
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChatState(s) => write!(f, "invalid chatstate: {s:?}"),
            Self::UnknownAudioAttribute(s) => write!(f, "unknown audio attribute: {s:?}"),
        }
    }
}

impl std::error::Error for ArgumentError {}

// ─── SessionError ─────────────────────────────────────────────────────────────

/// The union of everything a [`crate::Session`] operation can fail with.
#[derive(Debug)]
pub enum SessionError {
    /// Socket-level failure.
    Connection(ConnectionError),
    /// Protocol-level framing/token violation, or a remote `stream:error`.
    Stream(StreamError),
    /// Authentication rejected or expired.
    Login(LoginError),
    /// Payload failed to decode (bad UTF-8, MAC mismatch).
    Decode(DecodeError),
    /// Invalid argument to a convenience sender.
    Argument(ArgumentError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "{e}"),
            Self::Stream(e) => write!(f, "{e}"),
            Self::Login(e) => write!(f, "{e}"),
            Self::Decode(e) => write!(f, "{e}"),
            Self::Argument(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ConnectionError> for SessionError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

impl From<StreamError> for SessionError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<LoginError> for SessionError {
    fn from(e: LoginError) -> Self {
        Self::Login(e)
    }
}

impl From<DecodeError> for SessionError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<ArgumentError> for SessionError {
    fn from(e: ArgumentError) -> Self {
        Self::Argument(e)
    }
}

impl From<wirenode_core::ReaderError> for SessionError {
    fn from(e: wirenode_core::ReaderError) -> Self {
        match e {
            wirenode_core::ReaderError::Stream(e) => Self::Stream(e),
            wirenode_core::ReaderError::Decode(e) => Self::Decode(e),
        }
    }
}
