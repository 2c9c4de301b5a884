//! Session-wide configuration.

use std::time::Duration;

/// Tunables for a [`crate::Session`], analogous to the constants block at
/// the top of the reference client this crate's handshake is modeled on
/// (`HOST`, `PORT`, `PROTOCOL_DEVICE`, `TIMEOUT`, `ALIVE_INTERVAL`).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Remote host to connect to.
    pub host: String,
    /// Remote port to connect to.
    pub port: u16,
    /// Server domain used in the stream-open header's `to` attribute.
    pub server_domain: String,
    /// Device identifier string, e.g. `"S40"`.
    pub protocol_device: String,
    /// Protocol version string, e.g. `"2.12.89"`.
    pub protocol_version: String,
    /// Advertised `stream:features` children sent right after the
    /// stream-open header.
    pub features: Vec<String>,
    /// Whether inbound `message` stanzas get an automatic `receipt`.
    pub auto_receipt: bool,
    /// How long to wait for socket readability before returning to the
    /// caller with no new nodes.
    pub read_timeout: Duration,
    /// Minimum gap between two outbound keep-alive `presence` stanzas.
    pub keep_alive_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "c.whatsapp.net".to_string(),
            port: 443,
            server_domain: "s.whatsapp.net".to_string(),
            protocol_device: "S40".to_string(),
            protocol_version: "2.12.89".to_string(),
            features: vec![
                "readreceipts".to_string(),
                "groups_v2".to_string(),
                "privacy".to_string(),
                "presence".to_string(),
            ],
            auto_receipt: true,
            read_timeout: Duration::from_secs(1),
            keep_alive_interval: Duration::from_secs(20),
        }
    }
}

impl ClientConfig {
    /// The `resource` attribute value sent in the stream-open header:
    /// `<device>-<version>-<port>`.
    pub fn resource(&self) -> String {
        format!("{}-{}-{}", self.protocol_device, self.protocol_version, self.port)
    }
}
