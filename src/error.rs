//! Error types for dispatch and getter evaluation.

use crate::key::{Key, NodeId, NodeKind};

/// Errors surfaced by the container.
///
/// Errors returned by user actions and getters are carried unmodified in
/// [`MembrainError::User`]. Any `anyhow::Error` converts with `?`; if it
/// wraps a `MembrainError` (for example a failed nested dispatch bubbled up
/// through an action), the original variant is restored instead of being
/// wrapped twice.
#[derive(Debug, thiserror::Error)]
pub enum MembrainError {
    /// No action is registered at the dispatched path.
    #[error("unknown action: {path}")]
    UnknownAction {
        /// The dispatched path.
        path: String,
    },

    /// No getter is registered at the evaluated path.
    ///
    /// This also surfaces from `dispatch` when a write touches a dependency
    /// recorded by a getter that has since been removed.
    #[error("unknown getter: {path}")]
    UnknownGetter {
        /// The evaluated path.
        path: String,
    },

    /// The key cannot address a node of this kind.
    #[error("key {key} cannot be written on a {kind} node")]
    InvalidKey {
        /// The rejected key.
        key: Key,
        /// Kind of the node the write targeted.
        kind: NodeKind,
    },

    /// A list write targeted an index past its end. Only existing indices
    /// and the length itself (an append) can be written.
    #[error("index {index} is out of bounds for a list of length {len}")]
    IndexOutOfBounds {
        /// The rejected index.
        index: usize,
        /// Length of the list at the time of the write.
        len: usize,
    },

    /// The node id does not belong to the state tree.
    #[error("node {node} is not part of the state tree")]
    UnknownNode {
        /// The missing node.
        node: NodeId,
    },

    /// Linking the node under the parent would make the tree cyclic.
    #[error("linking node {node} under {parent} would create a cycle")]
    Cycle {
        /// The node being linked.
        node: NodeId,
        /// The node it would be linked under.
        parent: NodeId,
    },

    /// Error returned by an action or getter.
    #[error(transparent)]
    User(anyhow::Error),
}

impl From<anyhow::Error> for MembrainError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<MembrainError>() {
            Ok(err) => err,
            Err(err) => MembrainError::User(err),
        }
    }
}

impl MembrainError {
    /// Returns a reference to the inner user error if this is a `User` variant.
    pub fn user_error(&self) -> Option<&anyhow::Error> {
        match self {
            MembrainError::User(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast the user error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.user_error().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` if this is an [`MembrainError::UnknownAction`].
    pub fn is_unknown_action(&self) -> bool {
        matches!(self, MembrainError::UnknownAction { .. })
    }

    /// Returns `true` if this is an [`MembrainError::UnknownGetter`].
    pub fn is_unknown_getter(&self) -> bool {
        matches!(self, MembrainError::UnknownGetter { .. })
    }
}
