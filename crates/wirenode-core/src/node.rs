//! The in-memory stanza tree.

use std::collections::BTreeMap;
use std::fmt;

/// The payload carried by a [`Node`]'s `data` slot.
///
/// A node's data is either textual or an opaque byte string; the two are
/// distinguished by type rather than by sniffing the bytes, so the writer
/// never has to guess which wire form to emit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    /// A UTF-8 string, token- or JID-encodable.
    Text(String),
    /// An opaque byte sequence, always emitted via the raw-bytes leader.
    Bytes(Vec<u8>),
}

impl NodeData {
    /// Borrow the textual form, if this is [`NodeData::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bytes(_) => None,
        }
    }

    /// Borrow the raw bytes regardless of variant.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }
}

impl From<String> for NodeData {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for NodeData {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for NodeData {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// A stanza tree node: a name, a flat attribute map, and either textual
/// data, opaque byte data, or an ordered list of children — never more
/// than one of those three.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub data: Option<NodeData>,
    pub children: Option<Vec<Node>>,
}

/// Accepts either a single [`Node`] or a list of them at construction time,
/// normalising to `Vec<Node>` the way the original duck-typed `add()` did.
pub trait IntoChildren {
    fn into_children(self) -> Vec<Node>;
}

impl IntoChildren for Node {
    fn into_children(self) -> Vec<Node> {
        vec![self]
    }
}

impl IntoChildren for Vec<Node> {
    fn into_children(self) -> Vec<Node> {
        self
    }
}

impl<const N: usize> IntoChildren for [Node; N] {
    fn into_children(self) -> Vec<Node> {
        self.into()
    }
}

impl Node {
    /// Construct a bare node with no attributes, data, or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            data: None,
            children: None,
        }
    }

    /// Builder-style attribute setter.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style data setter. Panics in debug builds if children were
    /// already set — a node may carry data or children, never both.
    pub fn with_data(mut self, data: impl Into<NodeData>) -> Self {
        debug_assert!(self.children.is_none(), "node cannot carry both data and children");
        self.data = Some(data.into());
        self
    }

    /// Builder-style children setter, accepting a single node or a list.
    pub fn with_children(mut self, children: impl IntoChildren) -> Self {
        debug_assert!(self.data.is_none(), "node cannot carry both data and children");
        self.children = Some(children.into_children());
        self
    }

    /// Append a single child, promoting `children` from `None` if needed.
    pub fn add(&mut self, child: Node) -> &mut Self {
        debug_assert!(self.data.is_none(), "node cannot carry both data and children");
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    /// Read an attribute by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Whether an attribute is present.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Set (or overwrite) an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Find the first child with the given name, if any.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.as_deref()?.iter().find(|c| c.name == name)
    }

    /// Children as a slice, empty if there are none.
    pub fn children(&self) -> &[Node] {
        self.children.as_deref().unwrap_or(&[])
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (k, v) in &self.attributes {
            write!(f, " {k}={v:?}")?;
        }
        match (&self.data, &self.children) {
            (Some(NodeData::Text(s)), _) => write!(f, ">{s}</{}>", self.name),
            (Some(NodeData::Bytes(b)), _) => write!(f, ">[{} bytes]</{}>", b.len(), self.name),
            (None, Some(children)) => {
                write!(f, ">")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, "</{}>", self.name)
            }
            (None, None) => write!(f, "/>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_roundtrips_attributes() {
        let n = Node::new("iq").attr("type", "get").attr("id", "1");
        assert_eq!(n.get("type"), Some("get"));
        assert_eq!(n.get("id"), Some("1"));
        assert_eq!(n.get("missing"), None);
    }

    #[test]
    fn single_node_and_vec_both_normalise() {
        let a = Node::new("parent").with_children(Node::new("only"));
        assert_eq!(a.children().len(), 1);

        let b = Node::new("parent").with_children(vec![Node::new("a"), Node::new("b")]);
        assert_eq!(b.children().len(), 2);
    }

    #[test]
    fn child_lookup_finds_first_match() {
        let n = Node::new("ib").with_children(vec![
            Node::new("dirty").attr("type", "groups"),
            Node::new("offline"),
        ]);
        assert_eq!(n.child("dirty").unwrap().get("type"), Some("groups"));
        assert!(n.child("nope").is_none());
    }
}
