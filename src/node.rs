use serde_json::Value;

use crate::error::MembrainError;
use crate::key::{Key, NodeId};
use crate::read::{Entry, ReadView};
use crate::write::WriteView;

/// Property reads on a state node.
///
/// Implemented by [`ReadView`], whose reads are recorded as getter
/// dependencies, and by [`WriteView`], whose reads are not.
pub trait ReadableNode {
    /// View type returned for nested nodes.
    type Child<'v>
    where
        Self: 'v;

    /// Identity of the wrapped node.
    fn node_id(&self) -> NodeId;

    /// Read `key`. Nested nodes come back wrapped in the same kind of view.
    fn read(&mut self, key: Key) -> Option<Entry<Self::Child<'_>>>;

    /// Detached copy of the wrapped subtree, read without tracking.
    fn snapshot(&self) -> Value;
}

/// Property writes on a state node.
pub trait WritableNode {
    /// Write `value` at `key`.
    ///
    /// On a [`WriteView`] this propagates to every getter that read the key.
    /// On a [`ReadView`] the write is dropped and `Ok(())` is returned.
    fn write(&mut self, key: Key, value: Value) -> Result<(), MembrainError>;
}

impl<'a> ReadableNode for ReadView<'a> {
    type Child<'v> = ReadView<'a> where Self: 'v;

    fn node_id(&self) -> NodeId {
        ReadView::node_id(self)
    }

    fn read(&mut self, key: Key) -> Option<Entry<ReadView<'a>>> {
        self.get(key)
    }

    fn snapshot(&self) -> Value {
        ReadView::snapshot(self)
    }
}

impl WritableNode for ReadView<'_> {
    fn write(&mut self, key: Key, _value: Value) -> Result<(), MembrainError> {
        self.reject_write(&key);
        Ok(())
    }
}

impl<'a> ReadableNode for WriteView<'a> {
    type Child<'v> = WriteView<'v> where Self: 'v;

    fn node_id(&self) -> NodeId {
        WriteView::node_id(self)
    }

    fn read(&mut self, key: Key) -> Option<Entry<WriteView<'_>>> {
        self.get(key)
    }

    fn snapshot(&self) -> Value {
        WriteView::snapshot(self)
    }
}

impl WritableNode for WriteView<'_> {
    fn write(&mut self, key: Key, value: Value) -> Result<(), MembrainError> {
        self.set(key, value)
    }
}
