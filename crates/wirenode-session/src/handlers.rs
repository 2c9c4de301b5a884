//! Built-in responses to inbound stanzas, run before a node is offered to
//! the callback registry.

use log::debug;
use wirenode_core::{Encryption, Node, NodeData, StreamError};

use crate::error::SessionError;
use crate::session::Session;
use crate::transport::Transport;

impl<T: Transport> Session<T> {
    pub(crate) fn dispatch_builtin(&mut self, node: &Node) -> Result<(), SessionError> {
        match node.name.as_str() {
            "challenge" => self.handle_challenge(node)?,
            "message" => {
                if self.config.auto_receipt {
                    self.handle_receipt(node)?;
                }
            }
            "ib" => self.handle_ib(node)?,
            "iq" => self.handle_iq(node)?,
            "notification" => self.handle_notification(node)?,
            "success" => self.handle_success(node),
            "start" | "stream:features" | "failure" => {}
            "stream:error" => {
                let reason = node.children().first().map(|c| c.name.clone()).unwrap_or_default();
                return Err(StreamError::Remote(reason).into());
            }
            _ => debug!("no built-in handler for <{}>", node.name),
        }
        Ok(())
    }

    fn handle_challenge(&mut self, node: &Node) -> Result<(), SessionError> {
        let nonce = node.data.as_ref().map(NodeData::as_bytes).unwrap_or(&[]).to_vec();
        let keys = wirenode_crypto::derive(&self.secret, &nonce);
        let mut cipher = wirenode_crypto::KeystreamCipher::new(keys);

        let mut payload = Vec::new();
        payload.extend_from_slice(self.number.as_bytes());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
                .to_string()
                .as_bytes(),
        );

        let response_data = cipher.encrypt(&payload, false);
        self.cipher = Some(Box::new(cipher));

        let response = Node::new("response").with_data(NodeData::Bytes(response_data));
        self.send_node(&response, false)
    }

    fn handle_receipt(&mut self, node: &Node) -> Result<(), SessionError> {
        let Some(from) = node.get("from") else { return Ok(()) };
        let Some(id) = node.get("id") else { return Ok(()) };
        let receipt = Node::new("receipt")
            .attr("type", "read")
            .attr("to", from)
            .attr("id", id)
            .attr("t", unix_timestamp_string());
        self.send(&receipt)
    }

    fn handle_iq(&mut self, node: &Node) -> Result<(), SessionError> {
        let Some(iq) = node.children().first() else { return Ok(()) };

        match (node.get("type"), iq.name.as_str()) {
            (Some("get"), "ping") => {
                let Some(id) = node.get("id") else { return Ok(()) };
                let reply = Node::new("iq")
                    .attr("to", &self.config.server_domain)
                    .attr("id", id)
                    .attr("type", "result");
                self.send(&reply)
            }
            (Some("result"), _) => Ok(()),
            (ty, name) => {
                debug!("unknown iq message received: type={ty:?} child={name}");
                Ok(())
            }
        }
    }

    fn handle_ib(&mut self, node: &Node) -> Result<(), SessionError> {
        let mut categories = Vec::new();
        for child in node.children() {
            match child.name.as_str() {
                "dirty" => {
                    if let Some(category) = child.get("type") {
                        categories.push(category.to_string());
                    }
                }
                "offline" => {}
                other => debug!("no 'ib' handler for {other} implemented"),
            }
        }
        for category in categories {
            self.clear_dirty(&category)?;
        }
        Ok(())
    }

    fn clear_dirty(&mut self, category: &str) -> Result<(), SessionError> {
        let id = self.msgid("cleardirty");
        let node = Node::new("iq")
            .attr("id", id)
            .attr("type", "set")
            .attr("to", self.config.server_domain.clone())
            .attr("xmlns", "urn:xmpp:whatsapp:dirty")
            .with_children(Node::new("clean").attr("type", category));
        self.send(&node)
    }

    fn handle_notification(&mut self, node: &Node) -> Result<(), SessionError> {
        let Some(from) = node.get("from").map(str::to_string) else { return Ok(()) };
        let Some(id) = node.get("id").map(str::to_string) else { return Ok(()) };
        let Some(ty) = node.get("type").map(str::to_string) else { return Ok(()) };

        let mut ack = Node::new("ack").attr("to", from).attr("id", id).attr("type", ty).attr("class", "notification");
        if let Some(to) = node.get("to") {
            ack.set("from", to);
        }
        if let Some(participant) = node.get("participant") {
            ack.set("participant", participant);
        }
        self.send(&ack)
    }

    fn handle_success(&mut self, node: &Node) {
        if let Some(NodeData::Bytes(blob)) = &node.data {
            self.set_auth_blob(blob.clone());
        } else if let Some(NodeData::Text(blob)) = &node.data {
            self.set_auth_blob(blob.clone().into_bytes());
        }
        self.set_account_info(node.attributes.clone());
    }
}

fn unix_timestamp_string() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}
