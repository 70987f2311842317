//! Arena of state nodes.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use slab::Slab;

use crate::error::MembrainError;
use crate::key::{Key, NodeId, NodeKind};

/// A property value: either a JSON leaf or a reference to a node.
///
/// `Value::Object` and `Value::Array` never appear in a `Leaf`; they are
/// always allocated as nodes. `null` is a leaf.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Leaf(Value),
    Node(NodeId),
}

#[derive(Debug)]
pub(crate) enum Node {
    Map(IndexMap<String, Slot>),
    List(Vec<Slot>),
}

impl Node {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Node::Map(_) => NodeKind::Map,
            Node::List(_) => NodeKind::List,
        }
    }

    fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        let slots: Box<dyn Iterator<Item = &Slot>> = match self {
            Node::Map(fields) => Box::new(fields.values()),
            Node::List(items) => Box::new(items.iter()),
        };
        slots.filter_map(|slot| match slot {
            Slot::Node(id) => Some(*id),
            Slot::Leaf(_) => None,
        })
    }
}

/// Owns every node of the state tree.
///
/// Nodes are never freed implicitly: a node replaced by a write stays in the
/// arena until [`Store::collect_garbage`] is called.
#[derive(Debug)]
pub(crate) struct Store {
    nodes: Slab<Node>,
    root: NodeId,
}

impl Store {
    pub(crate) fn new(initial: Map<String, Value>) -> Self {
        let mut store = Self {
            nodes: Slab::new(),
            root: NodeId(0),
        };
        store.root = store.alloc_map(initial);
        store
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(Node::kind)
    }

    pub(crate) fn slot(&self, id: NodeId, key: &Key) -> Option<&Slot> {
        match (self.node(id)?, key) {
            (Node::Map(fields), Key::Field(name)) => fields.get(name),
            (Node::List(items), Key::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    pub(crate) fn has(&self, id: NodeId, key: &Key) -> bool {
        self.slot(id, key).is_some()
    }

    /// Number of entries of a node: fields of a map, elements of a list.
    pub(crate) fn entry_count(&self, id: NodeId) -> usize {
        match self.node(id) {
            Some(Node::Map(fields)) => fields.len(),
            Some(Node::List(items)) => items.len(),
            None => 0,
        }
    }

    pub(crate) fn keys(&self, id: NodeId) -> Vec<Key> {
        match self.node(id) {
            Some(Node::Map(fields)) => fields.keys().map(|name| Key::Field(name.clone())).collect(),
            Some(Node::List(items)) => (0..items.len()).map(Key::Index).collect(),
            None => Vec::new(),
        }
    }

    /// Checks that `key` can be written on the node.
    pub(crate) fn check_writable(&self, id: NodeId, key: &Key) -> Result<(), MembrainError> {
        let node = self.node(id).ok_or(MembrainError::UnknownNode { node: id })?;
        match (node, key) {
            (Node::List(items), Key::Index(index)) if *index > items.len() => {
                Err(MembrainError::IndexOutOfBounds {
                    index: *index,
                    len: items.len(),
                })
            }
            (Node::Map(_), Key::Field(_)) | (Node::List(_), Key::Index(_)) => Ok(()),
            (node, key) => Err(MembrainError::InvalidKey {
                key: key.clone(),
                kind: node.kind(),
            }),
        }
    }

    /// Converts a plain value into a slot, allocating fresh nodes for every
    /// object and array in it.
    pub(crate) fn alloc(&mut self, value: Value) -> Slot {
        match value {
            Value::Object(map) => Slot::Node(self.alloc_map(map)),
            Value::Array(values) => {
                let items: Vec<Slot> = values.into_iter().map(|v| self.alloc(v)).collect();
                Slot::Node(NodeId(self.nodes.insert(Node::List(items))))
            }
            leaf => Slot::Leaf(leaf),
        }
    }

    fn alloc_map(&mut self, map: Map<String, Value>) -> NodeId {
        let fields: IndexMap<String, Slot> = map
            .into_iter()
            .map(|(name, value)| (name, self.alloc(value)))
            .collect();
        NodeId(self.nodes.insert(Node::Map(fields)))
    }

    /// Writes `slot` at `key`, returning `true` if the node gained an entry.
    ///
    /// A list accepts any existing index, or its length to append.
    pub(crate) fn write(&mut self, id: NodeId, key: Key, slot: Slot) -> Result<bool, MembrainError> {
        let node = self
            .nodes
            .get_mut(id.0)
            .ok_or(MembrainError::UnknownNode { node: id })?;
        match (node, key) {
            (Node::Map(fields), Key::Field(name)) => Ok(fields.insert(name, slot).is_none()),
            (Node::List(items), Key::Index(index)) => {
                let len = items.len();
                match items.get_mut(index) {
                    Some(item) => {
                        *item = slot;
                        Ok(false)
                    }
                    None if index == len => {
                        items.push(slot);
                        Ok(true)
                    }
                    None => Err(MembrainError::IndexOutOfBounds { index, len }),
                }
            }
            (node, key) => Err(MembrainError::InvalidKey {
                key,
                kind: node.kind(),
            }),
        }
    }

    /// Removes a map field, preserving the order of the remaining fields.
    pub(crate) fn remove_field(&mut self, id: NodeId, name: &str) -> Option<Slot> {
        match self.nodes.get_mut(id.0)? {
            Node::Map(fields) => fields.shift_remove(name),
            Node::List(_) => None,
        }
    }

    pub(crate) fn pop(&mut self, id: NodeId) -> Option<Slot> {
        match self.nodes.get_mut(id.0)? {
            Node::List(items) => items.pop(),
            Node::Map(_) => None,
        }
    }

    /// Returns `true` if `to` is `from` or a descendant of it.
    pub(crate) fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = ahash::HashSet::default();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.node(id) {
                stack.extend(node.children());
            }
        }
        false
    }

    /// Frees every node that is no longer reachable from the root and
    /// returns the freed ids.
    pub(crate) fn collect_garbage(&mut self) -> Vec<NodeId> {
        let mut reachable = ahash::HashSet::default();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(node) = self.node(id) {
                stack.extend(node.children());
            }
        }
        let dead: Vec<NodeId> = self
            .nodes
            .iter()
            .map(|(key, _)| NodeId(key))
            .filter(|id| !reachable.contains(id))
            .collect();
        for id in &dead {
            self.nodes.remove(id.0);
        }
        dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(value: Value) -> Store {
        match value {
            Value::Object(map) => Store::new(map),
            _ => panic!("root must be an object"),
        }
    }

    fn child(store: &Store, id: NodeId, key: impl Into<Key>) -> NodeId {
        match store.slot(id, &key.into()) {
            Some(Slot::Node(id)) => *id,
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_alloc_assigns_distinct_ids() {
        let store = store(json!({"a": {"b": {"c": 1}}, "list": [1, {"x": true}]}));
        let a = child(&store, store.root(), "a");
        let b = child(&store, a, "b");
        let list = child(&store, store.root(), "list");
        let item = child(&store, list, 1usize);

        let ids: ahash::HashSet<NodeId> = [store.root(), a, b, list, item].into_iter().collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(store.len(), 5);
        assert_eq!(store.kind(list), Some(NodeKind::List));
    }

    #[test]
    fn test_null_is_a_leaf() {
        let store = store(json!({"missing": null}));
        assert_eq!(
            store.slot(store.root(), &Key::from("missing")),
            Some(&Slot::Leaf(Value::Null))
        );
    }

    #[test]
    fn test_write_reports_new_entries() {
        let mut store = store(json!({"a": 1}));
        let root = store.root();
        assert!(!store.write(root, "a".into(), Slot::Leaf(json!(2))).unwrap());
        assert!(store.write(root, "b".into(), Slot::Leaf(json!(3))).unwrap());
        assert_eq!(store.keys(root), vec![Key::from("a"), Key::from("b")]);
    }

    #[test]
    fn test_write_appends_only_at_list_end() {
        let mut store = store(json!({"list": [1]}));
        let list = child(&store, store.root(), "list");
        assert!(store.write(list, Key::Index(1), Slot::Leaf(json!(2))).unwrap());
        assert_eq!(store.entry_count(list), 2);

        let err = store
            .write(list, Key::Index(3), Slot::Leaf(json!(4)))
            .unwrap_err();
        assert!(matches!(
            err,
            MembrainError::IndexOutOfBounds { index: 3, len: 2 }
        ));
        assert!(store.check_writable(list, &Key::Index(usize::MAX)).is_err());
        assert!(store.check_writable(list, &Key::Index(2)).is_ok());
        assert_eq!(store.entry_count(list), 2);
    }

    #[test]
    fn test_write_rejects_mismatched_key() {
        let mut store = store(json!({"list": []}));
        let list = child(&store, store.root(), "list");
        let err = store
            .write(list, "name".into(), Slot::Leaf(json!(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            MembrainError::InvalidKey {
                kind: NodeKind::List,
                ..
            }
        ));
        assert!(store.check_writable(store.root(), &Key::Shape).is_err());
    }

    #[test]
    fn test_reaches() {
        let store = store(json!({"a": {"b": {}}}));
        let a = child(&store, store.root(), "a");
        let b = child(&store, a, "b");
        assert!(store.reaches(store.root(), b));
        assert!(store.reaches(a, a));
        assert!(!store.reaches(b, a));
    }

    #[test]
    fn test_collect_garbage_frees_replaced_subtrees() {
        let mut store = store(json!({"a": {"b": {}}, "keep": {}}));
        let root = store.root();
        let a = child(&store, root, "a");
        let b = child(&store, a, "b");
        let fresh = store.alloc(json!(0));
        store.write(root, "a".into(), fresh).unwrap();

        let mut dead = store.collect_garbage();
        dead.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(dead, expected);
        assert_eq!(store.len(), 2);
        assert!(!store.contains_node(a));
    }
}
