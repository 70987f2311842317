//! Write membrane: propagating views handed to actions.

use std::fmt;

use serde_json::Value;

use crate::error::MembrainError;
use crate::key::{Key, NodeId, NodeKind};
use crate::read::Entry;
use crate::runtime::Core;
use crate::snapshot::{materialize, materialize_slot};
use crate::store::Slot;

/// A writable view over one state node.
///
/// Every write looks up the getters recorded against the written property,
/// performs the write, then re-evaluates those getters and notifies their
/// watchers before returning. Writes are never batched: each one has fully
/// propagated by the time the next statement of the action runs.
///
/// Reads through a `WriteView` are not tracked.
pub struct WriteView<'a> {
    core: &'a mut Core,
    node: NodeId,
}

impl<'a> WriteView<'a> {
    pub(crate) fn new(core: &'a mut Core, node: NodeId) -> Self {
        Self { core, node }
    }

    /// Identity of the wrapped node. Pass it to [`WriteView::link`] to share
    /// the node under another key.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    fn slot(&self, key: impl Into<Key>) -> Option<&Slot> {
        self.core.store.slot(self.node, &key.into())
    }

    /// Read `key`. Nested nodes come back as nested write views.
    pub fn get(&mut self, key: impl Into<Key>) -> Option<Entry<WriteView<'_>>> {
        match self.slot(key)?.clone() {
            Slot::Leaf(value) => Some(Entry::Leaf(value)),
            Slot::Node(id) => Some(Entry::Node(WriteView::new(&mut *self.core, id))),
        }
    }

    /// Read `key` as a nested write view. `None` for leaves, including `null`.
    pub fn view(&mut self, key: impl Into<Key>) -> Option<WriteView<'_>> {
        let id = match self.slot(key)? {
            Slot::Node(id) => *id,
            Slot::Leaf(_) => return None,
        };
        Some(WriteView::new(&mut *self.core, id))
    }

    /// Read `key` as a detached plain value.
    pub fn value(&self, key: impl Into<Key>) -> Option<Value> {
        self.slot(key)
            .map(|slot| materialize_slot(&self.core.store, slot))
    }

    fn leaf(&self, key: impl Into<Key>) -> Option<&Value> {
        match self.slot(key)? {
            Slot::Leaf(value) => Some(value),
            Slot::Node(_) => None,
        }
    }

    /// Integer leaf at `key`.
    pub fn i64(&self, key: impl Into<Key>) -> Option<i64> {
        self.leaf(key).and_then(Value::as_i64)
    }

    /// Float leaf at `key`.
    pub fn f64(&self, key: impl Into<Key>) -> Option<f64> {
        self.leaf(key).and_then(Value::as_f64)
    }

    /// Boolean leaf at `key`.
    pub fn bool(&self, key: impl Into<Key>) -> Option<bool> {
        self.leaf(key).and_then(Value::as_bool)
    }

    /// String leaf at `key`.
    pub fn str(&self, key: impl Into<Key>) -> Option<&str> {
        self.leaf(key).and_then(Value::as_str)
    }

    /// Number of entries: fields of a map, elements of a list.
    pub fn len(&self) -> usize {
        self.core.store.entry_count(self.node)
    }

    /// Whether the node has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the node in order.
    pub fn keys(&self) -> Vec<Key> {
        self.core.store.keys(self.node)
    }

    /// Whether the wrapped node is a list.
    pub fn is_list(&self) -> bool {
        self.kind() == Some(NodeKind::List)
    }

    fn kind(&self) -> Option<NodeKind> {
        self.core.store.kind(self.node)
    }

    /// Detached copy of the wrapped subtree.
    pub fn snapshot(&self) -> Value {
        materialize(&self.core.store, self.node)
    }

    /// Write `value` at `key` and propagate.
    ///
    /// Objects and arrays in `value` become fresh nodes, replacing whatever
    /// was at `key` wholesale. Map nodes take field keys, list nodes take
    /// index keys. A list accepts an existing index, or its length to append;
    /// anything further fails with [`MembrainError::IndexOutOfBounds`].
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), MembrainError> {
        let key = key.into();
        self.core.store.check_writable(self.node, &key)?;
        let slot = self.core.store.alloc(value.into());
        self.assign(key, slot)
    }

    /// Attach an existing node at `key`, so the same node is reachable from
    /// two places. Getters that read it through either path depend on the
    /// same properties.
    pub fn link(&mut self, key: impl Into<Key>, node: NodeId) -> Result<(), MembrainError> {
        let key = key.into();
        self.core.store.check_writable(self.node, &key)?;
        if !self.core.store.contains_node(node) {
            return Err(MembrainError::UnknownNode { node });
        }
        if self.core.store.reaches(node, self.node) {
            return Err(MembrainError::Cycle {
                node,
                parent: self.node,
            });
        }
        self.assign(key, Slot::Node(node))
    }

    fn assign(&mut self, key: Key, slot: Slot) -> Result<(), MembrainError> {
        let reshapes = !self.core.store.has(self.node, &key);
        let affected = self
            .core
            .index
            .get_mut()
            .affected_by(self.node, &key, reshapes);
        self.core.store.write(self.node, key.clone(), slot)?;
        self.core.tracer.on_write(self.node, &key, &affected);
        self.core.propagate(&affected)
    }

    /// Append `value` to a list node.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), MembrainError> {
        let index = self.len();
        self.set(Key::Index(index), value)
    }

    /// Remove a field of a map node, returning its detached value.
    ///
    /// Removing a missing field is a no-op and propagates nothing.
    pub fn remove(&mut self, key: impl Into<Key>) -> Result<Option<Value>, MembrainError> {
        let key = key.into();
        let name = match (key.as_field().map(str::to_string), self.kind()) {
            (Some(name), Some(NodeKind::Map)) => name,
            (_, Some(kind)) => return Err(MembrainError::InvalidKey { key, kind }),
            (_, None) => return Err(MembrainError::UnknownNode { node: self.node }),
        };
        if !self.core.store.has(self.node, &key) {
            return Ok(None);
        }
        let affected = self.core.index.get_mut().affected_by(self.node, &key, true);
        let removed = self.core.store.remove_field(self.node, &name);
        let value = removed.map(|slot| materialize_slot(&self.core.store, &slot));
        self.core.tracer.on_write(self.node, &key, &affected);
        self.core.propagate(&affected)?;
        Ok(value)
    }

    /// Remove the last element of a list node, returning its detached value.
    pub fn pop(&mut self) -> Result<Option<Value>, MembrainError> {
        match self.kind() {
            Some(NodeKind::List) => {}
            Some(kind) => {
                return Err(MembrainError::InvalidKey {
                    key: Key::Shape,
                    kind,
                })
            }
            None => return Err(MembrainError::UnknownNode { node: self.node }),
        }
        let Some(last) = self.len().checked_sub(1) else {
            return Ok(None);
        };
        let key = Key::Index(last);
        let affected = self.core.index.get_mut().affected_by(self.node, &key, true);
        let removed = self.core.store.pop(self.node);
        let value = removed.map(|slot| materialize_slot(&self.core.store, &slot));
        self.core.tracer.on_write(self.node, &key, &affected);
        self.core.propagate(&affected)?;
        Ok(value)
    }

    /// Dispatch another action from inside this one. Its writes propagate
    /// before this call returns.
    pub fn dispatch(&mut self, path: &str, payload: impl Into<Value>) -> Result<(), MembrainError> {
        self.core.dispatch(path, &payload.into())
    }
}

impl fmt::Debug for WriteView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteView")
            .field("node", &self.node)
            .finish()
    }
}
