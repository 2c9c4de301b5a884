//! Reference implementation of [`wirenode_core::Encryption`].
//!
//! Provides:
//! - [`sha256!`] — a small hashing macro for one or more concatenated slices
//! - [`keystream::derive`] — shared-secret + nonce → per-direction key pair
//! - [`keystream::KeystreamCipher`] — the concrete stream cipher + MAC

#![deny(unsafe_code)]

mod keystream;
mod sha;

pub use keystream::{derive, DerivedKeys, KeystreamCipher};
