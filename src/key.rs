use std::fmt;

use serde::{Deserialize, Serialize};

/// Key addresses one property of a state node.
///
/// Map nodes are addressed by [`Key::Field`], list nodes by [`Key::Index`].
/// [`Key::Shape`] is the structural property of either kind of node: its set
/// of keys for a map, its length for a list. It is read by `len`, `keys` and
/// `items`, and written whenever an entry is added or removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    /// A named field of a map node.
    Field(String),
    /// A position in a list node.
    Index(usize),
    /// The key set or length of a node.
    Shape,
}

impl Key {
    /// Returns the field name if this is a [`Key::Field`].
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Key::Field(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the position if this is a [`Key::Index`].
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Field(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => write!(f, "{name}"),
            Key::Index(index) => write!(f, "[{index}]"),
            Key::Shape => write!(f, "<shape>"),
        }
    }
}

/// Stable identity of a state node.
///
/// Assigned when the node is created and kept for the node's lifetime. The
/// dependency index is keyed by this id, never by the path used to reach the
/// node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two kinds of non-leaf values in the state tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// String-keyed, insertion-ordered.
    Map,
    /// Index-keyed.
    List,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Map => write!(f, "map"),
            NodeKind::List => write!(f, "list"),
        }
    }
}
