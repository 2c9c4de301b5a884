//! The abstract interface the codec consumes for per-frame confidentiality.
//!
//! Real key derivation and the stream cipher itself live outside this
//! crate (see `wirenode-crypto` for a reference implementation); the codec
//! only needs something that can encrypt and decrypt byte strings.

use std::fmt;

/// Raised when decryption fails — MAC mismatch or truncated ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// The appended MAC did not match the computed one.
    MacMismatch,
    /// The ciphertext was too short to contain an appended MAC.
    Truncated,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacMismatch => write!(f, "MAC mismatch on decrypt"),
            Self::Truncated => write!(f, "ciphertext shorter than appended MAC"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// A keyed, per-direction stream cipher installed after the challenge
/// handshake completes.
///
/// Implementations own two independent keystreams (one per direction) and
/// per-direction counters; neither method is safe to call from more than
/// one thread at a time; confine an `Encryption` to the owning session.
pub trait Encryption {
    /// Encrypt `plaintext`, optionally prepending a MAC ahead of the
    /// ciphertext rather than appending one after it.
    fn encrypt(&mut self, plaintext: &[u8], prepend_mac: bool) -> Vec<u8>;

    /// Decrypt `ciphertext` (including its appended MAC), returning the
    /// plaintext, or [`CryptoError`] if the MAC does not check out.
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
