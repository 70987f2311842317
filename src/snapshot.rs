//! Detached copies of state subtrees.
//!
//! Materializing never records a dependency: it reads the arena directly,
//! not through a view.

use serde_json::{Map, Value};

use crate::key::NodeId;
use crate::store::{Node, Slot, Store};

/// Copy the subtree rooted at `node` into a fresh plain value.
///
/// The result shares nothing with the store; mutating it has no effect on
/// the state tree. A node that is not in the store materializes as `null`.
pub(crate) fn materialize(store: &Store, node: NodeId) -> Value {
    match store.node(node) {
        Some(Node::Map(fields)) => {
            let map: Map<String, Value> = fields
                .iter()
                .map(|(name, slot)| (name.clone(), materialize_slot(store, slot)))
                .collect();
            Value::Object(map)
        }
        Some(Node::List(items)) => Value::Array(
            items
                .iter()
                .map(|slot| materialize_slot(store, slot))
                .collect(),
        ),
        None => Value::Null,
    }
}

pub(crate) fn materialize_slot(store: &Store, slot: &Slot) -> Value {
    match slot {
        Slot::Leaf(value) => value.clone(),
        Slot::Node(id) => materialize(store, *id),
    }
}
