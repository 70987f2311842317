//! Event collector for testing and inspection.
//!
//! `EventCollector` is a [`Tracer`] that accumulates [`TraceEvent`]s for
//! later inspection and assertion.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::key::{Key, NodeId};
use crate::registry::WatcherId;
use crate::tracer::Tracer;

/// A recorded tracer event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// An action started.
    DispatchStart {
        /// Path of the action.
        action: String,
    },
    /// An action returned.
    DispatchEnd {
        /// Path of the action.
        action: String,
        /// Whether the action and everything it triggered succeeded.
        ok: bool,
    },
    /// A getter was recorded against a property.
    DependencyRecorded {
        /// Path of the reading getter.
        getter: String,
        /// Node that holds the property.
        node: NodeId,
        /// Key of the property.
        key: Key,
    },
    /// A getter's dependencies were dropped before re-evaluation.
    DependenciesForgotten {
        /// Path of the getter.
        getter: String,
        /// Number of dependencies dropped.
        count: usize,
    },
    /// A property was written.
    Write {
        /// Node that holds the property.
        node: NodeId,
        /// Key of the property.
        key: Key,
        /// Getters about to be re-evaluated, in order.
        affected: Vec<String>,
    },
    /// A getter's write through its read view was dropped.
    WriteRejected {
        /// Path of the getter that attempted the write.
        getter: String,
        /// Node the write targeted.
        node: NodeId,
        /// Key the write targeted.
        key: Key,
    },
    /// A getter was evaluated.
    GetterEvaluated {
        /// Path of the getter.
        getter: String,
        /// Whether the evaluation succeeded.
        ok: bool,
    },
    /// A watcher was called.
    WatcherNotified {
        /// Getter path the watcher is subscribed to.
        path: String,
        /// The notified watcher.
        watcher: WatcherId,
    },
    /// Unreachable nodes were freed.
    GarbageCollected {
        /// Number of nodes freed.
        freed: usize,
    },
}

/// Tracer that accumulates events in memory.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use membrain::{EventCollector, Membrain, TraceEvent};
///
/// let collector = Arc::new(EventCollector::new());
/// let mut membrain = Membrain::builder().tracer_arc(collector.clone()).build();
/// membrain.add_action("noop", |_, _| Ok(()));
/// membrain.dispatch("noop", serde_json::Value::Null).unwrap();
///
/// assert_eq!(
///     collector.events()[0],
///     TraceEvent::DispatchStart { action: "noop".to_string() }
/// );
/// ```
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<TraceEvent>>,
}

impl EventCollector {
    /// Create a new empty event collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Take collected events, clearing the collector.
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Get the number of collected events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if no events have been collected.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn push(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}

impl Tracer for EventCollector {
    fn on_dispatch_start(&self, action: &str) {
        self.push(TraceEvent::DispatchStart {
            action: action.to_string(),
        });
    }

    fn on_dispatch_end(&self, action: &str, ok: bool) {
        self.push(TraceEvent::DispatchEnd {
            action: action.to_string(),
            ok,
        });
    }

    fn on_dependency_recorded(&self, getter: &str, node: NodeId, key: &Key) {
        self.push(TraceEvent::DependencyRecorded {
            getter: getter.to_string(),
            node,
            key: key.clone(),
        });
    }

    fn on_dependencies_forgotten(&self, getter: &str, count: usize) {
        self.push(TraceEvent::DependenciesForgotten {
            getter: getter.to_string(),
            count,
        });
    }

    fn on_write(&self, node: NodeId, key: &Key, affected: &[String]) {
        self.push(TraceEvent::Write {
            node,
            key: key.clone(),
            affected: affected.to_vec(),
        });
    }

    fn on_write_rejected(&self, getter: &str, node: NodeId, key: &Key) {
        self.push(TraceEvent::WriteRejected {
            getter: getter.to_string(),
            node,
            key: key.clone(),
        });
    }

    fn on_getter_evaluated(&self, getter: &str, ok: bool) {
        self.push(TraceEvent::GetterEvaluated {
            getter: getter.to_string(),
            ok,
        });
    }

    fn on_watcher_notified(&self, path: &str, watcher: WatcherId) {
        self.push(TraceEvent::WatcherNotified {
            path: path.to_string(),
            watcher,
        });
    }

    fn on_garbage_collected(&self, freed: usize) {
        self.push(TraceEvent::GarbageCollected { freed });
    }
}
