//! Incremental byte-stream → [`Node`] decoder.
//!
//! The reader is safe to call repeatedly: partial input at any boundary
//! leaves the accumulating buffer untouched and returns
//! [`ParseOutcome::Incomplete`] without consuming a single byte.

use std::collections::BTreeMap;

use crate::cursor::Cursor;
use crate::encryption::Encryption;
use crate::error::{CryptoError, DecodeError, ReaderError, StreamError};
use crate::nibble;
use crate::node::{Node, NodeData};
use crate::token::TokenTable;

/// The result of attempting to pull one frame off the accumulated buffer.
pub enum ParseOutcome {
    /// A complete node was decoded, paired with the plaintext frame bytes
    /// (post-decryption, if the frame was encrypted).
    Node(Node, Vec<u8>),
    /// Not enough bytes are buffered yet; try again after the next `feed`.
    Incomplete,
    /// The peer sent the graceful-close sentinel (top-level token `0x02`).
    EndOfStream,
}

/// Accumulates inbound bytes and decodes them into [`Node`]s one frame at
/// a time.
#[derive(Default)]
pub struct Reader {
    buf: Vec<u8>,
}

impl Reader {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append newly received bytes to the accumulating buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes currently buffered and unconsumed.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Attempt to decode the next frame.
    ///
    /// `decrypt` must be `Some` once the session has installed inbound
    /// cipher keys; an encrypted frame arriving before that is a
    /// [`StreamError`] surfaced as [`ReaderError::Stream`]... actually as
    /// a decode error, since no keys exist to decrypt with.
    pub fn next(
        &mut self,
        tokens: &dyn TokenTable,
        decrypt: Option<&mut dyn Encryption>,
    ) -> Result<ParseOutcome, ReaderError> {
        if self.buf.len() < 3 {
            return Ok(ParseOutcome::Incomplete);
        }

        let peek = (self.buf[0] as u32) << 16 | (self.buf[1] as u32) << 8 | self.buf[2] as u32;
        let flags = (peek >> 20) & 0xF;
        let length = (peek & 0xF_FFFF) as usize;

        if self.buf.len() < 3 + length {
            return Ok(ParseOutcome::Incomplete);
        }

        // Frame is complete: now it is safe to consume the header + payload.
        let payload: Vec<u8> = self.buf.drain(0..3 + length).skip(3).collect();

        let plaintext = if flags & 0x8 != 0 {
            let cipher = decrypt.ok_or(ReaderError::Decode(DecodeError::Crypto(CryptoError::Truncated)))?;
            cipher.decrypt(&payload).map_err(DecodeError::from)?
        } else {
            payload
        };

        let mut cursor = Cursor::new(&plaintext);
        match read_node(&mut cursor, tokens) {
            Ok(Some(node)) => Ok(ParseOutcome::Node(node, plaintext)),
            Ok(None) => Ok(ParseOutcome::EndOfStream),
            Err(e) => Err(ReaderError::Stream(e)),
        }
    }
}

/// Decode one node from `cursor`. Returns `Ok(None)` for the end-of-stream
/// sentinel (top-level token `0x02`).
fn read_node(cursor: &mut Cursor, tokens: &dyn TokenTable) -> Result<Option<Node>, StreamError> {
    let list_length = read_list_start(cursor)?;
    let leader = cursor.peek_u8()?;

    if leader == 0x01 {
        cursor.u8()?;
        let attributes = read_attributes(cursor, tokens, list_length)?;
        return Ok(Some(Node {
            name: "start".to_string(),
            attributes,
            data: None,
            children: None,
        }));
    }
    if leader == 0x02 {
        cursor.u8()?;
        return Ok(None);
    }

    let name = read_string(cursor, tokens)?;
    let attributes = read_attributes(cursor, tokens, list_length)?;

    let mut data = None;
    let mut children = None;

    if list_length % 2 == 0 {
        let next = cursor.peek_u8()?;
        if next == 0xF8 || next == 0xF9 {
            children = Some(read_node_list(cursor, tokens)?);
        } else {
            data = Some(read_data(cursor, tokens)?);
        }
    }

    Ok(Some(Node { name, attributes, data, children }))
}

fn read_node_list(cursor: &mut Cursor, tokens: &dyn TokenTable) -> Result<Vec<Node>, StreamError> {
    let count = read_list_start(cursor)?;
    let mut nodes = Vec::with_capacity(count);
    for _ in 0..count {
        match read_node(cursor, tokens)? {
            Some(n) => nodes.push(n),
            None => return Err(StreamError::EndOfStream),
        }
    }
    Ok(nodes)
}

fn read_list_start(cursor: &mut Cursor) -> Result<usize, StreamError> {
    match cursor.u8()? {
        0x00 => Ok(0),
        0xF8 => Ok(cursor.u8()? as usize),
        0xF9 => Ok(cursor.u16()? as usize),
        other => Err(StreamError::UnknownListStartToken(other)),
    }
}

fn read_attributes(
    cursor: &mut Cursor,
    tokens: &dyn TokenTable,
    list_length: usize,
) -> Result<BTreeMap<String, String>, StreamError> {
    let count = (list_length.saturating_sub(1)) / 2;
    let mut attrs = BTreeMap::new();
    for _ in 0..count {
        let key = read_string(cursor, tokens)?;
        let value = read_string(cursor, tokens)?;
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Read a string slot in a strictly-textual context (names, attribute
/// keys/values, JID components). Errors if a raw-bytes leader's content
/// is not valid UTF-8.
fn read_string(cursor: &mut Cursor, tokens: &dyn TokenTable) -> Result<String, StreamError> {
    match read_raw_string(cursor, tokens)? {
        RawString::Text(s) => Ok(s),
        RawString::Bytes(b) => String::from_utf8(b).map_err(|_| StreamError::UnknownStringToken(0xFC)),
    }
}

/// Read a node's `data` slot. Dictionary/JID-derived content is always
/// textual; a raw-bytes leader's content is kept as [`NodeData::Bytes`]
/// unless it happens to be valid UTF-8, in which case it is normalised to
/// [`NodeData::Text`] (this is the "normalised form" the round-trip
/// property is defined over — see DESIGN.md).
fn read_data(cursor: &mut Cursor, tokens: &dyn TokenTable) -> Result<NodeData, StreamError> {
    match read_raw_string(cursor, tokens)? {
        RawString::Text(s) => Ok(NodeData::Text(s)),
        RawString::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Ok(NodeData::Text(s)),
            Err(e) => Ok(NodeData::Bytes(e.into_bytes())),
        },
    }
}

enum RawString {
    Text(String),
    Bytes(Vec<u8>),
}

fn read_raw_string(cursor: &mut Cursor, tokens: &dyn TokenTable) -> Result<RawString, StreamError> {
    let tok = cursor.u8()?;
    match tok {
        0x00 => Ok(RawString::Text(String::new())),
        0xFA => {
            let user = read_string(cursor, tokens)?;
            let server = read_string(cursor, tokens)?;
            Ok(RawString::Text(format!("{user}@{server}")))
        }
        0xFC => {
            let len = cursor.u8()? as usize;
            Ok(RawString::Bytes(cursor.take(len)?.to_vec()))
        }
        0xFD => {
            let len = cursor.u24()? as usize;
            Ok(RawString::Bytes(cursor.take(len)?.to_vec()))
        }
        0xFE => {
            let idx = cursor.u8()? as u16;
            let s = tokens
                .tok_to_str(0xF5 + idx)
                .ok_or(StreamError::UnknownStringToken(0xFE))?;
            Ok(RawString::Text(s.to_string()))
        }
        0xFF => {
            let header = cursor.u8()?;
            let ignore_last = header & 0x80 != 0;
            let size = (header & 0x7F) as usize;
            let data = cursor.take(size)?;
            let s = nibble::decode(data, ignore_last).ok_or(StreamError::UnknownStringToken(0xFF))?;
            Ok(RawString::Text(s))
        }
        0xEC => {
            let extra = cursor.u8()? as u16;
            let s = tokens
                .tok_to_str(0xED + extra)
                .ok_or(StreamError::UnknownStringToken(0xEC))?;
            Ok(RawString::Text(s.to_string()))
        }
        0x03..=0xEB => {
            let s = tokens.tok_to_str(tok as u16).ok_or(StreamError::UnknownStringToken(tok))?;
            Ok(RawString::Text(s.to_string()))
        }
        other => Err(StreamError::UnknownStringToken(other)),
    }
}
