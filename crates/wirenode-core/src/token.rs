//! The dictionary that maps single-byte (and secondary-page) tokens to the
//! strings they stand in for.
//!
//! The real dictionary is proprietary — roughly 500 entries maintained by
//! the server operator. [`TokenTable`] is the seam a deployment plugs its
//! own frozen table into; [`StaticTokenTable`] ships a small representative
//! table so the codec and its tests are self-contained.

/// Bidirectional token ⟷ string lookup.
///
/// Implementers must not extend the dictionary at runtime: both directions
/// have to stay in lockstep with whatever the peer was built against.
pub trait TokenTable {
    /// Look up the token id for a string, if the dictionary knows it.
    fn str_to_tok(&self, s: &str) -> Option<u16>;

    /// Look up the string for a token id, if the dictionary knows it.
    fn tok_to_str(&self, tok: u16) -> Option<&str>;
}

/// A small frozen dictionary covering the stanza names, attribute keys,
/// and enum values this crate's handlers and operations emit.
///
/// Ids below `0xF5` are primary-page (single-byte token); ids from `0xF5`
/// up to `0x1F4` inclusive are secondary-page, reached on the wire via the
/// `0xFE` prefix per the framing in [`crate::writer`]/[`crate::reader`].
pub struct StaticTokenTable;

/// Entry `i` of this table has token id `i + FIRST_TOKEN`.
const FIRST_TOKEN: u16 = 0x03;

const DICTIONARY: &[&str] = &[
    "account", "ack", "active", "auth", "body", "challenge", "chatstate",
    "class", "clean", "cleardirty", "composing", "context", "data", "dirty",
    "duration", "encoding", "error", "expiration", "failure", "features",
    "file", "from", "g.us", "get", "gone", "group", "iq", "id", "image",
    "inactive", "index", "jabber:iq:last", "jabber:x:event", "kind", "last",
    "latitude", "location", "longitude", "media", "message", "mode", "name",
    "nickname", "notification", "notify", "number", "offline", "paused",
    "ping", "presence", "privacy", "props", "query", "read",
    "receipt", "request", "resource", "response", "result", "s.whatsapp.net",
    "security", "server", "set", "size", "status", "stream:error",
    "stream:features", "success", "sync", "t", "text", "thumbnail", "to",
    "type", "unavailable", "url", "urn:xmpp:receipts",
    "urn:xmpp:whatsapp", "urn:xmpp:whatsapp:dirty", "urn:xmpp:whatsapp:mms",
    "urn:xmpp:whatsapp:sync", "user", "vcard", "w", "x", "xmlns",
];

impl TokenTable for StaticTokenTable {
    fn str_to_tok(&self, s: &str) -> Option<u16> {
        DICTIONARY
            .iter()
            .position(|&d| d == s)
            .map(|idx| idx as u16 + FIRST_TOKEN)
    }

    fn tok_to_str(&self, tok: u16) -> Option<&str> {
        let idx = tok.checked_sub(FIRST_TOKEN)? as usize;
        DICTIONARY.get(idx).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_round_trips() {
        let table = StaticTokenTable;
        for &word in DICTIONARY {
            let tok = table.str_to_tok(word).expect("dictionary word must tokenise");
            assert_eq!(table.tok_to_str(tok), Some(word));
        }
    }

    #[test]
    fn unknown_string_has_no_token() {
        let table = StaticTokenTable;
        assert_eq!(table.str_to_tok("totally-unknown-string"), None);
    }

    #[test]
    fn first_token_is_single_byte_range() {
        // First dictionary entry must land below the secondary-page boundary.
        assert!(FIRST_TOKEN < 0xF5);
    }
}
