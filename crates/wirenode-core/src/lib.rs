//! Wire codec for a tokenised, optionally-encrypted stanza-tree protocol.
//!
//! This crate handles:
//! * The in-memory stanza tree ([`Node`]/[`NodeData`])
//! * The dictionary seam a deployment plugs its token table into ([`TokenTable`])
//! * Encoding ([`Writer`]) and incremental decoding ([`Reader`]) of framed stanzas
//! * The pluggable stream-cipher seam ([`Encryption`])
//!
//! It is intentionally transport-agnostic: bring your own `TcpStream`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cursor;
pub mod encryption;
pub mod error;
pub mod nibble;
pub mod node;
pub mod reader;
pub mod token;
pub mod writer;

pub use encryption::{CryptoError, Encryption};
pub use error::{DecodeError, ReaderError, StreamError};
pub use node::{IntoChildren, Node, NodeData};
pub use reader::{ParseOutcome, Reader};
pub use token::{StaticTokenTable, TokenTable};
pub use writer::{Writer, PRELUDE};
