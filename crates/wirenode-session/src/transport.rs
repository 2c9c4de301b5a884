//! Pluggable transport layer.
//!
//! Implement [`Transport`] over a `TcpStream` or an in-memory fake to get
//! session framing/dispatch for free; the session layer only ever calls
//! these two methods.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// A full-duplex byte-stream transport with a bounded-blocking readiness
/// check, the idiomatic stand-in for a `select(2)`-based wait.
pub trait Transport {
    /// The error type returned by read/write operations. Convertible to
    /// [`io::Error`] so the session layer can fold it into
    /// [`crate::error::ConnectionError`] regardless of the concrete
    /// transport in use.
    type Error: std::error::Error + Send + Sync + 'static + Into<io::Error>;

    /// Send raw bytes to the remote.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Block up to `timeout` waiting for the remote to become readable,
    /// then return whatever bytes are currently available.
    ///
    /// `Ok(Some(bytes))` with an empty `bytes` means the timeout elapsed
    /// with nothing to read, not a logical no-op: the reader's `feed` is
    /// still fine to call with an empty slice. `Ok(None)` signals a
    /// graceful close (the remote shut the connection down); callers
    /// should stop reading rather than busy-loop on it.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, Self::Error>;
}

// ─── TcpTransport ─────────────────────────────────────────────────────────────

/// Wraps a [`TcpStream`], applying `set_read_timeout` as the bounded
/// readiness wait.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `host:port` and configure the read timeout.
    pub fn connect(host: &str, port: u16, read_timeout: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(read_timeout))?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    type Error = io::Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.stream.write_all(data)
    }

    fn recv(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut buf = [0u8; 4096];
        match self.stream.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Ok(Some(Vec::new()))
            }
            Err(e) => Err(e),
        }
    }
}
