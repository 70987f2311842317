//! Read membrane: dependency-recording views handed to getters.

use std::cell::RefCell;
use std::fmt;

use serde_json::Value;

use crate::index::DependencyIndex;
use crate::key::{Key, NodeId};
use crate::snapshot::{materialize, materialize_slot};
use crate::store::{Slot, Store};
use crate::tracer::Tracer;

/// The value found at a key: a leaf, or a nested view over a node.
///
/// `null` is always a leaf.
#[derive(Debug, Clone)]
pub enum Entry<V> {
    /// A JSON leaf (null, bool, number or string).
    Leaf(Value),
    /// A map or list node, wrapped in the same kind of view.
    Node(V),
}

impl<V> Entry<V> {
    /// The leaf value, if this is a leaf.
    pub fn leaf(&self) -> Option<&Value> {
        match self {
            Entry::Leaf(value) => Some(value),
            Entry::Node(_) => None,
        }
    }

    /// The nested view, if this is a node.
    pub fn into_node(self) -> Option<V> {
        match self {
            Entry::Node(view) => Some(view),
            Entry::Leaf(_) => None,
        }
    }

    /// Whether this is a `null` leaf.
    pub fn is_null(&self) -> bool {
        matches!(self, Entry::Leaf(Value::Null))
    }

    /// The leaf as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.leaf().and_then(Value::as_i64)
    }

    /// The leaf as a float.
    pub fn as_f64(&self) -> Option<f64> {
        self.leaf().and_then(Value::as_f64)
    }

    /// The leaf as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        self.leaf().and_then(Value::as_bool)
    }

    /// The leaf as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        self.leaf().and_then(Value::as_str)
    }
}

/// A read-only view over one state node, tagged with the getter evaluating
/// through it.
///
/// Every key read through the view is recorded in the dependency index
/// against the tagged getter, including keys that turn out to be missing.
/// Nested nodes come back as nested views with the same tag, so tracking
/// extends to any depth. Writing through a `ReadView` (see
/// [`WritableNode`](crate::WritableNode)) is silently dropped.
///
/// Views are `Copy`; passing them around is free.
#[derive(Clone, Copy)]
pub struct ReadView<'a> {
    store: &'a Store,
    index: &'a RefCell<DependencyIndex>,
    tracer: &'a dyn Tracer,
    getter: &'a str,
    node: NodeId,
}

impl<'a> ReadView<'a> {
    pub(crate) fn new(
        store: &'a Store,
        index: &'a RefCell<DependencyIndex>,
        tracer: &'a dyn Tracer,
        getter: &'a str,
        node: NodeId,
    ) -> Self {
        Self {
            store,
            index,
            tracer,
            getter,
            node,
        }
    }

    fn child(&self, node: NodeId) -> Self {
        Self { node, ..*self }
    }

    fn track(&self, key: &Key) {
        let recorded = self
            .index
            .borrow_mut()
            .record(self.node, key.clone(), self.getter);
        if recorded {
            self.tracer
                .on_dependency_recorded(self.getter, self.node, key);
        }
    }

    /// Records the read and returns the raw slot.
    fn slot(&self, key: Key) -> Option<&'a Slot> {
        self.track(&key);
        self.store.slot(self.node, &key)
    }

    fn entry(&self, slot: &'a Slot) -> Entry<ReadView<'a>> {
        match slot {
            Slot::Leaf(value) => Entry::Leaf(value.clone()),
            Slot::Node(id) => Entry::Node(self.child(*id)),
        }
    }

    /// Identity of the wrapped node.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// The getter path this view records dependencies for.
    pub fn getter(&self) -> &'a str {
        self.getter
    }

    /// Read `key`, returning `None` if the node has no such key.
    pub fn get(&self, key: impl Into<Key>) -> Option<Entry<ReadView<'a>>> {
        self.slot(key.into()).map(|slot| self.entry(slot))
    }

    /// Read `key` as a nested view. `None` for leaves, including `null`.
    pub fn view(&self, key: impl Into<Key>) -> Option<ReadView<'a>> {
        match self.slot(key.into())? {
            Slot::Node(id) => Some(self.child(*id)),
            Slot::Leaf(_) => None,
        }
    }

    /// Read `key` as a plain value. Nested nodes are materialized; only
    /// `key` itself is recorded.
    pub fn value(&self, key: impl Into<Key>) -> Option<Value> {
        self.slot(key.into())
            .map(|slot| materialize_slot(self.store, slot))
    }

    /// Read `key` as an integer leaf.
    pub fn i64(&self, key: impl Into<Key>) -> Option<i64> {
        self.leaf(key).and_then(Value::as_i64)
    }

    /// Read `key` as a float leaf.
    pub fn f64(&self, key: impl Into<Key>) -> Option<f64> {
        self.leaf(key).and_then(Value::as_f64)
    }

    /// Read `key` as a boolean leaf.
    pub fn bool(&self, key: impl Into<Key>) -> Option<bool> {
        self.leaf(key).and_then(Value::as_bool)
    }

    /// Read `key` as a string leaf. The slice borrows the state, not the view.
    pub fn str(&self, key: impl Into<Key>) -> Option<&'a str> {
        self.leaf(key).and_then(Value::as_str)
    }

    fn leaf(&self, key: impl Into<Key>) -> Option<&'a Value> {
        match self.slot(key.into())? {
            Slot::Leaf(value) => Some(value),
            Slot::Node(_) => None,
        }
    }

    /// Number of entries. Records a dependency on the node's shape.
    pub fn len(&self) -> usize {
        self.track(&Key::Shape);
        self.store.entry_count(self.node)
    }

    /// Records a dependency on the node's shape.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the node in order. Records a dependency on the node's shape.
    pub fn keys(&self) -> Vec<Key> {
        self.track(&Key::Shape);
        self.store.keys(self.node)
    }

    /// Every entry of the node in order. Records the shape and each key.
    pub fn items(&self) -> Vec<(Key, Entry<ReadView<'a>>)> {
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let slot = self.slot(key.clone())?;
                Some((key, self.entry(slot)))
            })
            .collect()
    }

    /// Whether the wrapped node is a list. Not a tracked read: a node's kind
    /// never changes.
    pub fn is_list(&self) -> bool {
        matches!(self.store.kind(self.node), Some(crate::NodeKind::List))
    }

    /// Detached copy of the wrapped subtree. Records nothing.
    pub fn snapshot(&self) -> Value {
        materialize(self.store, self.node)
    }

    pub(crate) fn reject_write(&self, key: &Key) {
        self.tracer.on_write_rejected(self.getter, self.node, key);
    }
}

impl fmt::Debug for ReadView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadView")
            .field("getter", &self.getter)
            .field("node", &self.node)
            .finish()
    }
}
