//! End-to-end coverage driven entirely through [`wirenode_session::Transport`],
//! the same seam a real socket plugs into. No mocking framework: a local
//! `MemTransport` fake, in the teacher's style.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use wirenode_core::{Encryption, Node, NodeData, ParseOutcome, Reader, StaticTokenTable, Writer};
use wirenode_crypto::{derive, DerivedKeys, KeystreamCipher};
use wirenode_session::{
    ArgumentError, Callback, CallbackValue, ClientConfig, Session, SessionError, SessionState, Transport,
};

#[derive(Clone)]
struct MemTransport {
    inbox: Rc<RefCell<VecDeque<u8>>>,
    outbox: Rc<RefCell<Vec<u8>>>,
}

impl MemTransport {
    fn new() -> Self {
        Self { inbox: Rc::new(RefCell::new(VecDeque::new())), outbox: Rc::new(RefCell::new(Vec::new())) }
    }

    fn push_inbound(&self, data: &[u8]) {
        self.inbox.borrow_mut().extend(data.iter().copied());
    }

    fn outbox_bytes(&self) -> Vec<u8> {
        self.outbox.borrow().clone()
    }
}

impl Transport for MemTransport {
    type Error = io::Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.outbox.borrow_mut().extend_from_slice(data);
        Ok(())
    }

    fn recv(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(Some(self.inbox.borrow_mut().drain(..).collect()))
    }
}

const NUMBER: &str = "15551234567";
const SECRET: &[u8] = b"shared-secret-for-tests";

fn new_session(transport: MemTransport, nickname: Option<&str>) -> Session<MemTransport> {
    let mut config = ClientConfig::default();
    config.keep_alive_interval = Duration::from_millis(5);
    Session::new(
        transport,
        config,
        Box::new(StaticTokenTable),
        NUMBER,
        SECRET.to_vec(),
        nickname.map(str::to_string),
    )
}

fn encode(node: &Node) -> Vec<u8> {
    let tokens = StaticTokenTable;
    Writer::new(&tokens).encode_frame(node, None).0
}

fn decode_plain(bytes: &[u8]) -> Vec<Node> {
    let tokens = StaticTokenTable;
    let mut reader = Reader::new();
    reader.feed(bytes);
    let mut nodes = Vec::new();
    loop {
        match reader.next(&tokens, None).unwrap() {
            ParseOutcome::Node(n, _) => nodes.push(n),
            ParseOutcome::Incomplete | ParseOutcome::EndOfStream => break,
        }
    }
    nodes
}

#[test]
fn connect_installs_cipher_and_authenticates() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, Some("tester"));

    let nonce = b"session-nonce-0001".to_vec();
    let challenge = Node::new("challenge").with_data(NodeData::Bytes(nonce.clone()));
    let success = Node::new("success")
        .attr("status", "active")
        .attr("kind", "free")
        .attr("expiration", "0")
        .with_data(NodeData::Bytes(b"cached-auth-blob".to_vec()));

    handle.push_inbound(&encode(&challenge));
    handle.push_inbound(&encode(&success));

    session.connect().expect("handshake should succeed");

    assert_eq!(session.state(), SessionState::Online);
    assert_eq!(session.auth_blob(), Some(&b"cached-auth-blob"[..]));
    assert_eq!(session.account_info().get("status").map(String::as_str), Some("active"));

    // Skip the stream-open header, which is not length-prefixed framing.
    let tokens = StaticTokenTable;
    let writer = Writer::new(&tokens);
    let header = writer.start_stream(&ClientConfig::default().server_domain, &ClientConfig::default().resource());
    let outbox = handle.outbox_bytes();
    assert!(outbox.starts_with(&header));
    let rest = &outbox[header.len()..];

    let mut reader = Reader::new();
    reader.feed(rest);

    let features = match reader.next(&tokens, None).unwrap() {
        ParseOutcome::Node(n, _) => n,
        _ => panic!("expected stream:features"),
    };
    assert_eq!(features.name, "stream:features");
    assert!(features.child("readreceipts").is_some());

    let auth = match reader.next(&tokens, None).unwrap() {
        ParseOutcome::Node(n, _) => n,
        _ => panic!("expected auth"),
    };
    assert_eq!(auth.name, "auth");
    assert_eq!(auth.get("mechanism"), Some("WAUTH-2"));
    assert_eq!(auth.get("user"), Some(NUMBER));

    let response = match reader.next(&tokens, None).unwrap() {
        ParseOutcome::Node(n, _) => n,
        _ => panic!("expected response"),
    };
    assert_eq!(response.name, "response");
    let response_bytes = match response.data {
        Some(NodeData::Bytes(b)) => b,
        _ => panic!("response must carry raw bytes"),
    };

    // The response's cipher is a freshly derived one, counter zero, so it
    // can be decrypted deterministically regardless of anything the
    // session did with its own (separately instantiated) copy afterwards.
    let client_keys = derive(SECRET, &nonce);
    let verify_keys = DerivedKeys { read_key: client_keys.write_key, write_key: client_keys.read_key };
    let mut verify_cipher = KeystreamCipher::new(verify_keys);
    let plaintext = verify_cipher.decrypt(&response_bytes).expect("response MAC must check out");
    assert!(plaintext.starts_with(NUMBER.as_bytes()));
    assert!(plaintext.windows(nonce.len()).any(|w| w == nonce.as_slice()));

    // Presence is sent after login, now encrypted under the installed cipher.
    let presence_frame_start = rest.len() - reader.buffered_len();
    let flag = rest[presence_frame_start] >> 4;
    assert_eq!(flag, 0x8, "post-login presence must be sent encrypted");
}

#[test]
fn auth_failure_disconnects_and_surfaces_login_error() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, None);

    handle.push_inbound(&encode(&Node::new("failure")));

    let err = session.connect().expect_err("failure stanza must fail the handshake");
    assert!(matches!(err, SessionError::Login(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn ping_iq_gets_a_result_reply() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, None);

    let ping = Node::new("iq")
        .attr("type", "get")
        .attr("id", "ping-1")
        .with_children(Node::new("ping"));
    handle.push_inbound(&encode(&ping));

    session.incoming().unwrap();

    let reply = decode_plain(&handle.outbox_bytes());
    assert_eq!(reply.len(), 1);
    assert_eq!(reply[0].name, "iq");
    assert_eq!(reply[0].get("id"), Some("ping-1"));
    assert_eq!(reply[0].get("type"), Some("result"));
}

#[test]
fn dirty_category_is_cleaned() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, None);

    let ib = Node::new("ib").with_children(Node::new("dirty").attr("type", "groups"));
    handle.push_inbound(&encode(&ib));

    session.incoming().unwrap();

    let outgoing = decode_plain(&handle.outbox_bytes());
    assert_eq!(outgoing.len(), 1);
    let iq = &outgoing[0];
    assert_eq!(iq.name, "iq");
    assert_eq!(iq.get("type"), Some("set"));
    assert_eq!(iq.get("xmlns"), Some("urn:xmpp:whatsapp:dirty"));
    let clean = iq.child("clean").expect("clean child");
    assert_eq!(clean.get("type"), Some("groups"));
}

#[test]
fn keep_alive_sends_one_presence_per_elapsed_interval() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, None);

    session.service_loop().unwrap();
    assert!(decode_plain(&handle.outbox_bytes()).is_empty(), "interval has not elapsed yet");

    std::thread::sleep(Duration::from_millis(10));
    session.service_loop().unwrap();
    let after_first = decode_plain(&handle.outbox_bytes());
    assert_eq!(after_first.len(), 1);
    assert_eq!(after_first[0].name, "presence");
    assert_eq!(after_first[0].get("type"), Some("active"));

    session.service_loop().unwrap();
    assert_eq!(decode_plain(&handle.outbox_bytes()).len(), 1, "must not resend before the interval elapses again");

    std::thread::sleep(Duration::from_millis(10));
    session.service_loop().unwrap();
    assert_eq!(decode_plain(&handle.outbox_bytes()).len(), 2);
}

#[test]
fn connect_with_cached_auth_blob_sends_auth_frame_unencrypted() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, None);

    let blob = b"cached-blob-from-disk".to_vec();
    session.restore_auth_blob(blob.clone());

    handle.push_inbound(&encode(
        &Node::new("success").attr("status", "active").attr("kind", "free").attr("expiration", "0"),
    ));

    session.connect().expect("cached-blob handshake should succeed");
    assert_eq!(session.state(), SessionState::Online);

    let tokens = StaticTokenTable;
    let writer = Writer::new(&tokens);
    let header = writer.start_stream(&ClientConfig::default().server_domain, &ClientConfig::default().resource());
    let outbox = handle.outbox_bytes();
    let rest = &outbox[header.len()..];

    let mut reader = Reader::new();
    reader.feed(rest);

    match reader.next(&tokens, None).unwrap() {
        ParseOutcome::Node(n, _) => assert_eq!(n.name, "stream:features"),
        _ => panic!("expected stream:features"),
    }

    // Decoding with `None` (no cipher) only succeeds if the frame header's
    // flag nibble is unset; an encrypted frame would error here instead.
    let auth = match reader.next(&tokens, None).unwrap() {
        ParseOutcome::Node(n, _) => n,
        _ => panic!("expected auth frame, decodable without a cipher"),
    };
    assert_eq!(auth.name, "auth");
    let data = match auth.data {
        Some(NodeData::Bytes(b)) => b,
        _ => panic!("auth must carry the cipher-output payload as raw bytes"),
    };
    assert!(data.windows(NUMBER.len()).any(|w| w == NUMBER.as_bytes()));
    assert!(data.windows(blob.len()).any(|w| w == blob.as_slice()));
}

#[test]
fn register_and_wait_races_multiple_callbacks_and_returns_the_winner() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, None);

    handle.push_inbound(&encode(&Node::new("success")));

    let success = Callback::new("success", |_| true, |_| Ok(CallbackValue::Unit));
    let failure = Callback::new("failure", |_| true, |_| Ok(CallbackValue::Seconds(0)));

    let outcome = session.register_and_wait([success, failure]).expect("one callback must latch");
    assert_eq!(outcome, CallbackValue::Unit, "the success callback, not failure, must have won the race");
}

#[test]
fn invalid_chatstate_is_rejected_without_sending_anything() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, None);

    let err = session.send_chatstate("15559876543", "dancing").unwrap_err();
    assert!(matches!(err, SessionError::Argument(ArgumentError::InvalidChatState(_))));
    assert!(handle.outbox_bytes().is_empty());
}

#[test]
fn send_message_wraps_body_in_the_expected_envelope() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, Some("tester"));

    session.send_message("15559876543", "hello there").unwrap();

    let sent = decode_plain(&handle.outbox_bytes());
    assert_eq!(sent.len(), 1);
    let message = &sent[0];
    assert_eq!(message.name, "message");
    assert_eq!(message.get("to"), Some("15559876543@s.whatsapp.net"));
    assert_eq!(message.get("type"), Some("text"));
    let body = message.child("body").expect("body child");
    assert_eq!(body.data.as_ref().and_then(NodeData::as_text), Some("hello there"));
    assert!(message.child("request").is_some());
}

#[test]
fn send_audio_rejects_unknown_attribute() {
    let transport = MemTransport::new();
    let handle = transport.clone();
    let mut session = new_session(transport, None);

    let mut attrs = std::collections::BTreeMap::new();
    attrs.insert("not-a-real-attribute".to_string(), "1".to_string());

    let err = session.send_audio("15559876543", "https://example/a.ogg", "a.ogg", 42, &attrs).unwrap_err();
    assert!(matches!(err, SessionError::Argument(ArgumentError::UnknownAudioAttribute(_))));
    assert!(handle.outbox_bytes().is_empty());
}
