//! Convenience senders recovered from the original client: plain messages,
//! presence, chat state, media, contact sync, and the two query-style
//! operations (`last_seen`, `send_server_properties`) built as genuine
//! register-and-wait calls over the callback registry.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use wirenode_core::{Node, StreamError};

use crate::callback::{Callback, CallbackValue};
use crate::error::{ArgumentError, SessionError};
use crate::session::Session;
use crate::transport::Transport;

/// The five chat states the wire protocol recognises. `Gone`'s wire
/// semantics are not exercised by this client; the validator still
/// accepts it and leaves the meaning to the peer.
const CHATSTATES: &[&str] = &["active", "inactive", "composing", "paused", "gone"];

const CHATSTATE_NS: &str = "http://jabber.org/protocol/chatstates";
const AUDIO_ATTRIBUTE_WHITELIST: &[&str] =
    &["abitrate", "acodec", "asampfmt", "asampfreq", "duration", "encoding", "filehash", "mimetype"];

fn unix_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

impl<T: Transport> Session<T> {
    fn message_envelope(&mut self, to: &str, payload: Node) -> (String, Node) {
        let msgid = self.msgid("message");
        let to = self.jid(to);

        let x = Node::new("x").attr("xmlns", "jabber:x:event").with_children(Node::new("server"));
        let notify = Node::new("notify").attr("xmlns", "urn:xmpp:whatsapp").attr(
            "name",
            self.nickname.clone().unwrap_or_default(),
        );
        let request = Node::new("request").attr("xmlns", "urn:xmpp:receipts");

        let message = Node::new("message")
            .attr("to", to)
            .attr("type", "text")
            .attr("id", msgid.clone())
            .attr("t", unix_timestamp().to_string())
            .with_children(vec![x, notify, request, payload]);

        (msgid, message)
    }

    /// Send a plain-text message to `to`, returning the generated message id.
    pub fn send_message(&mut self, to: &str, body: &str) -> Result<String, SessionError> {
        let (msgid, message) = self.message_envelope(to, Node::new("body").with_data(body));
        self.send(&message)?;
        Ok(msgid)
    }

    /// Send a plain-text message to a group JID, returning the message id.
    pub fn send_group_message(&mut self, group: &str, body: &str) -> Result<String, SessionError> {
        self.send_message(group, body)
    }

    /// Send a chat-state notification to `to`, validated against the five
    /// known states, returning the generated message id.
    pub fn send_chatstate(&mut self, to: &str, state: &str) -> Result<String, SessionError> {
        if !CHATSTATES.contains(&state) {
            return Err(ArgumentError::InvalidChatState(state.to_string()).into());
        }
        let node = Node::new(state).attr("xmlns", CHATSTATE_NS);
        let (msgid, message) = self.message_envelope(to, node);
        self.send(&message)?;
        Ok(msgid)
    }

    /// Send an image reference to `to`.
    pub fn send_image(
        &mut self,
        to: &str,
        url: &str,
        basename: &str,
        size: u64,
        thumbnail: Option<&str>,
    ) -> Result<String, SessionError> {
        let mut media = Node::new("media")
            .attr("xmlns", "urn:xmpp:whatsapp:mms")
            .attr("type", "image")
            .attr("url", url)
            .attr("file", basename)
            .attr("size", size.to_string());
        if let Some(thumbnail) = thumbnail {
            media = media.with_data(thumbnail);
        }
        let (msgid, message) = self.message_envelope(to, media);
        self.send(&message)?;
        Ok(msgid)
    }

    /// Send an audio reference to `to`. `attributes` keys must be in
    /// [`AUDIO_ATTRIBUTE_WHITELIST`].
    pub fn send_audio(
        &mut self,
        to: &str,
        url: &str,
        basename: &str,
        size: u64,
        attributes: &BTreeMap<String, String>,
    ) -> Result<String, SessionError> {
        for name in attributes.keys() {
            if !AUDIO_ATTRIBUTE_WHITELIST.contains(&name.as_str()) {
                return Err(ArgumentError::UnknownAudioAttribute(name.clone()).into());
            }
        }

        let mut media = Node::new("media")
            .attr("xmlns", "urn:xmpp:whatsapp:mms")
            .attr("type", "audio")
            .attr("url", url)
            .attr("file", basename)
            .attr("size", size.to_string());
        for (k, v) in attributes {
            media.set(k.clone(), v.clone());
        }
        let (msgid, message) = self.message_envelope(to, media);
        self.send(&message)?;
        Ok(msgid)
    }

    /// Send a location update to `to`.
    pub fn send_location(&mut self, to: &str, latitude: &str, longitude: &str) -> Result<String, SessionError> {
        let media = Node::new("media")
            .attr("xmlns", "urn:xmpp:whatsapp:mms")
            .attr("type", "location")
            .attr("latitude", latitude)
            .attr("longitude", longitude);
        let (msgid, message) = self.message_envelope(to, media);
        self.send(&message)?;
        Ok(msgid)
    }

    /// Send a vCard to `to`.
    pub fn send_vcard(&mut self, to: &str, name: &str, data: &str) -> Result<String, SessionError> {
        let vcard = Node::new("vcard").attr("name", name).with_data(data);
        let media = Node::new("media")
            .attr("xmlns", "urn:xmpp:whatsapp:mms")
            .attr("type", "vcard")
            .attr("encoding", "text")
            .with_children(vcard);
        let (msgid, message) = self.message_envelope(to, media);
        self.send(&message)?;
        Ok(msgid)
    }

    /// Register-and-wait for the `seconds` a contact was last seen.
    pub fn last_seen(&mut self, number: &str) -> Result<u64, SessionError> {
        let msgid = self.msgid("lastseen");
        let iq = Node::new("iq")
            .attr("type", "get")
            .attr("id", msgid.clone())
            .attr("from", format!("{}@{}", self.number, self.config.server_domain))
            .attr("to", format!("{number}@{}", self.config.server_domain))
            .with_children(Node::new("query").attr("xmlns", "jabber:iq:last"));
        self.send(&iq)?;

        let wanted_id = msgid;
        let callback = Callback::new(
            "iq",
            move |node| node.get("id") == Some(wanted_id.as_str()),
            |node| {
                if node.get("type") == Some("error") {
                    let reason = node
                        .child("error")
                        .and_then(|e| e.children().first())
                        .map(|c| c.name.clone())
                        .unwrap_or_default();
                    return Err(StreamError::Remote(reason).into());
                }
                let seconds = node
                    .child("query")
                    .and_then(|q| q.get("seconds"))
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                Ok(CallbackValue::Seconds(seconds))
            },
        );

        match self.register_and_wait([callback])? {
            CallbackValue::Seconds(s) => Ok(s),
            _ => Ok(0),
        }
    }

    /// Sync a contact list. `sid` follows the original's Windows
    /// FILETIME-epoch-offset computation, preserved bit-for-bit.
    pub fn send_sync(
        &mut self,
        numbers: &[String],
        mode: &str,
        context: &str,
        index: u32,
        last: bool,
    ) -> Result<(), SessionError> {
        let msgid = self.msgid("sync");
        let sid = (unix_timestamp() + 11_644_477_200) * 10_000_000;

        let mut sync = Node::new("sync")
            .attr("mode", mode)
            .attr("context", context)
            .attr("sid", sid.to_string())
            .attr("index", index.to_string())
            .attr("last", if last { "true" } else { "false" });

        for number in numbers {
            let number = if number.starts_with('+') { number.clone() } else { format!("+{number}") };
            sync.add(Node::new("user").with_data(number));
        }

        let node = Node::new("iq")
            .attr("to", format!("{}@{}", self.number, self.config.server_domain))
            .attr("type", "get")
            .attr("id", msgid)
            .attr("xmlns", "urn:xmpp:whatsapp:sync")
            .with_children(sync);

        self.send(&node)
    }

    /// Query server properties (`iq[type=get]{props}`).
    pub fn send_server_properties(&mut self) -> Result<(), SessionError> {
        let msgid = self.msgid("getproperties");
        let node = Node::new("iq")
            .attr("id", msgid)
            .attr("type", "get")
            .attr("xmlns", "w")
            .attr("to", self.config.server_domain.clone())
            .with_children(Node::new("props"));
        self.send(&node)
    }
}
