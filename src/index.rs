//! Dependency index linking (node, key) pairs to the getters that read them.

use std::collections::HashMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::key::{Key, NodeId};

/// One property a getter depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// The node that was read.
    pub node: NodeId,
    /// The key read on that node.
    pub key: Key,
}

/// Table of getter dependencies, keyed by node identity.
///
/// Entries only grow under the default tracking mode. Getter sets keep
/// insertion order, which is the order propagation re-evaluates them in.
#[derive(Debug, Default)]
pub(crate) struct DependencyIndex {
    entries: HashMap<Dependency, IndexSet<String>, ahash::RandomState>,
    by_getter: HashMap<String, IndexSet<Dependency>, ahash::RandomState>,
}

impl DependencyIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record that `getter` read `key` on `node`. Returns `true` if the
    /// dependency was not recorded before.
    pub(crate) fn record(&mut self, node: NodeId, key: Key, getter: &str) -> bool {
        let dependency = Dependency { node, key };
        let getters = self.entries.entry(dependency.clone()).or_default();
        if getters.contains(getter) {
            return false;
        }
        getters.insert(getter.to_string());
        self.by_getter
            .entry(getter.to_string())
            .or_default()
            .insert(dependency);
        true
    }

    /// Point-in-time copy of the getters recorded against (node, key).
    pub(crate) fn lookup(&self, node: NodeId, key: &Key) -> Vec<String> {
        let dependency = Dependency {
            node,
            key: key.clone(),
        };
        self.entries
            .get(&dependency)
            .map(|getters| getters.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Getters affected by a write to (node, key). When the write changes the
    /// node's shape, getters that read the shape are appended after the
    /// getters of the key itself.
    pub(crate) fn affected_by(&self, node: NodeId, key: &Key, reshapes: bool) -> Vec<String> {
        let mut affected: IndexSet<String> = self.lookup(node, key).into_iter().collect();
        if reshapes {
            affected.extend(self.lookup(node, &Key::Shape));
        }
        affected.into_iter().collect()
    }

    pub(crate) fn dependencies_of(&self, getter: &str) -> Vec<Dependency> {
        self.by_getter
            .get(getter)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every dependency recorded for `getter`. Returns how many were
    /// dropped.
    pub(crate) fn forget(&mut self, getter: &str) -> usize {
        let Some(deps) = self.by_getter.remove(getter) else {
            return 0;
        };
        for dependency in &deps {
            if let Some(getters) = self.entries.get_mut(dependency) {
                getters.shift_remove(getter);
                if getters.is_empty() {
                    self.entries.remove(dependency);
                }
            }
        }
        deps.len()
    }

    /// Drop every entry recorded against one of `nodes`.
    pub(crate) fn purge(&mut self, nodes: &[NodeId]) {
        if nodes.is_empty() {
            return;
        }
        self.entries.retain(|dependency, _| !nodes.contains(&dependency.node));
        for deps in self.by_getter.values_mut() {
            deps.retain(|dependency| !nodes.contains(&dependency.node));
        }
        self.by_getter.retain(|_, deps| !deps.is_empty());
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
