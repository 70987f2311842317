//! Keyed registries for actions, getters and watchers.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use slab::Slab;

use crate::read::ReadView;
use crate::tracer::Tracer;
use crate::write::WriteView;

/// A registered mutation routine.
pub type Action = Rc<dyn Fn(&mut WriteView<'_>, &Value) -> anyhow::Result<()>>;

/// A registered derivation routine.
pub type Getter = Rc<dyn Fn(ReadView<'_>) -> anyhow::Result<Value>>;

type Watcher = Box<dyn FnMut(&Value)>;

/// Handle returned by [`Membrain::watch`](crate::Membrain::watch), used to
/// unsubscribe.
///
/// The serial makes a stale handle harmless after its slot has been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatcherId {
    slot: usize,
    serial: u64,
}

struct WatcherSlot {
    path: String,
    serial: u64,
    callback: Watcher,
}

#[derive(Default)]
pub(crate) struct Registry {
    actions: HashMap<String, Action, ahash::RandomState>,
    getters: HashMap<String, Getter, ahash::RandomState>,
    watchers: Slab<WatcherSlot>,
    /// Watchers per path, in subscription order.
    subscriptions: HashMap<String, Vec<WatcherId>, ahash::RandomState>,
    next_serial: u64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_action(&mut self, path: String, action: Action) {
        self.actions.insert(path, action);
    }

    pub(crate) fn remove_action(&mut self, path: &str) -> bool {
        self.actions.remove(path).is_some()
    }

    pub(crate) fn action(&self, path: &str) -> Option<Action> {
        self.actions.get(path).cloned()
    }

    pub(crate) fn add_getter(&mut self, path: String, getter: Getter) {
        self.getters.insert(path, getter);
    }

    pub(crate) fn remove_getter(&mut self, path: &str) -> bool {
        self.getters.remove(path).is_some()
    }

    pub(crate) fn getter(&self, path: &str) -> Option<Getter> {
        self.getters.get(path).cloned()
    }

    pub(crate) fn watch(&mut self, path: String, callback: Watcher) -> WatcherId {
        let serial = self.next_serial;
        self.next_serial += 1;
        let slot = self.watchers.insert(WatcherSlot {
            path: path.clone(),
            serial,
            callback,
        });
        let id = WatcherId { slot, serial };
        self.subscriptions.entry(path).or_default().push(id);
        id
    }

    pub(crate) fn unwatch(&mut self, id: WatcherId) -> bool {
        match self.watchers.get(id.slot) {
            Some(watcher) if watcher.serial == id.serial => {}
            _ => return false,
        }
        let watcher = self.watchers.remove(id.slot);
        if let Some(ids) = self.subscriptions.get_mut(&watcher.path) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.subscriptions.remove(&watcher.path);
            }
        }
        true
    }

    pub(crate) fn watcher_count(&self, path: &str) -> usize {
        self.subscriptions.get(path).map_or(0, Vec::len)
    }

    /// Calls every watcher at `path` with `value`, in subscription order.
    pub(crate) fn notify(&mut self, path: &str, value: &Value, tracer: &dyn Tracer) {
        let Some(ids) = self.subscriptions.get(path) else {
            return;
        };
        for id in ids {
            if let Some(watcher) = self.watchers.get_mut(id.slot) {
                (watcher.callback)(value);
                tracer.on_watcher_notified(path, *id);
            }
        }
    }
}
