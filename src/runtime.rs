//! The container: state, registries, and the dispatch and evaluation paths.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MembrainError;
use crate::index::{Dependency, DependencyIndex};
use crate::key::NodeId;
use crate::read::ReadView;
use crate::registry::{Registry, WatcherId};
use crate::snapshot::materialize;
use crate::store::Store;
use crate::tracer::{NoopTracer, Tracer};
use crate::write::WriteView;

/// How a getter's recorded dependencies evolve across evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyTracking {
    /// Dependencies only accumulate. A getter stays subscribed to every
    /// property it ever read, even if a later evaluation no longer reads it.
    #[default]
    Accumulate,
    /// A getter's dependencies are dropped right before each evaluation, so
    /// it is subscribed to exactly what its latest evaluation read.
    Recompute,
}

/// Container settings.
///
/// Deserializable, so it can live in an application's config file:
///
/// ```
/// use membrain::{DependencyTracking, MembrainConfig};
///
/// let config: MembrainConfig =
///     serde_json::from_str(r#"{"tracking": "recompute"}"#).unwrap();
/// assert_eq!(config.tracking, DependencyTracking::Recompute);
/// assert!(config.prime_getters);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembrainConfig {
    /// Dependency tracking mode.
    pub tracking: DependencyTracking,
    /// Evaluate each getter once when it is registered, so its dependencies
    /// are known before the first dispatch.
    pub prime_getters: bool,
}

impl Default for MembrainConfig {
    fn default() -> Self {
        Self {
            tracking: DependencyTracking::Accumulate,
            prime_getters: true,
        }
    }
}

/// Everything a dispatch touches. Write views borrow it mutably for the
/// duration of an action.
pub(crate) struct Core {
    pub(crate) store: Store,
    pub(crate) index: RefCell<DependencyIndex>,
    pub(crate) registry: Registry,
    pub(crate) tracer: Arc<dyn Tracer>,
    pub(crate) config: MembrainConfig,
}

impl Core {
    pub(crate) fn dispatch(&mut self, path: &str, payload: &Value) -> Result<(), MembrainError> {
        let action = self
            .registry
            .action(path)
            .ok_or_else(|| MembrainError::UnknownAction {
                path: path.to_string(),
            })?;
        self.tracer.on_dispatch_start(path);
        let root = self.store.root();
        let result = {
            let mut view = WriteView::new(self, root);
            action(&mut view, payload)
        };
        let result = result.map_err(MembrainError::from);
        self.tracer.on_dispatch_end(path, result.is_ok());
        result
    }

    /// Evaluate the getter at `path` through a fresh read view over the root.
    pub(crate) fn evaluate(&self, path: &str) -> Result<Value, MembrainError> {
        let getter = self
            .registry
            .getter(path)
            .ok_or_else(|| MembrainError::UnknownGetter {
                path: path.to_string(),
            })?;
        if self.config.tracking == DependencyTracking::Recompute {
            let forgotten = self.index.borrow_mut().forget(path);
            if forgotten > 0 {
                self.tracer.on_dependencies_forgotten(path, forgotten);
            }
        }
        let view = ReadView::new(
            &self.store,
            &self.index,
            &*self.tracer,
            path,
            self.store.root(),
        );
        let result = getter(view).map_err(MembrainError::from);
        self.tracer.on_getter_evaluated(path, result.is_ok());
        result
    }

    pub(crate) fn trigger_update(&mut self, path: &str) -> Result<(), MembrainError> {
        let value = self.evaluate(path)?;
        self.registry.notify(path, &value, &*self.tracer);
        Ok(())
    }

    /// Re-evaluate `affected` in order. Stops at the first failure.
    pub(crate) fn propagate(&mut self, affected: &[String]) -> Result<(), MembrainError> {
        for path in affected {
            self.trigger_update(path)?;
        }
        Ok(())
    }
}

/// A reactive state container.
///
/// Holds a tree of JSON-like state, a registry of actions that mutate it
/// through a [`WriteView`], a registry of getters that derive values from it
/// through a [`ReadView`], and watchers that receive a getter's value every
/// time one of the properties it read is written.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use membrain::Membrain;
/// use serde_json::{json, Value};
///
/// let mut membrain = Membrain::builder()
///     .initial_state(json!({"count": 0}).as_object().cloned().unwrap())
///     .build();
///
/// membrain.add_getter("count", |view| Ok(json!(view.i64("count")))).unwrap();
/// membrain.add_action("increment", |view, _| {
///     let count = view.i64("count").unwrap_or(0);
///     view.set("count", count + 1)?;
///     Ok(())
/// });
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// membrain.watch("count", move |value| sink.borrow_mut().push(value.clone()));
///
/// membrain.dispatch("increment", Value::Null).unwrap();
/// membrain.dispatch("increment", Value::Null).unwrap();
/// assert_eq!(*seen.borrow(), vec![json!(1), json!(2)]);
/// ```
pub struct Membrain {
    core: Core,
}

impl Default for Membrain {
    fn default() -> Self {
        Self::new()
    }
}

impl Membrain {
    /// Create a container with an empty root map and default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for customizing the container.
    pub fn builder() -> MembrainBuilder {
        MembrainBuilder::new()
    }

    /// The active configuration.
    pub fn config(&self) -> &MembrainConfig {
        &self.core.config
    }

    /// Register an action at `path`, replacing any previous one.
    pub fn add_action<F>(&mut self, path: impl Into<String>, action: F)
    where
        F: Fn(&mut WriteView<'_>, &Value) -> anyhow::Result<()> + 'static,
    {
        self.core.registry.add_action(path.into(), Rc::new(action));
    }

    /// Unregister the action at `path`. Returns `false` if there was none.
    pub fn remove_action(&mut self, path: &str) -> bool {
        self.core.registry.remove_action(path)
    }

    /// Whether an action is registered at `path`.
    pub fn has_action(&self, path: &str) -> bool {
        self.core.registry.action(path).is_some()
    }

    /// Register a getter at `path`, replacing any previous one.
    ///
    /// With [`MembrainConfig::prime_getters`] enabled (the default), the
    /// getter is evaluated once right away so its dependencies are recorded.
    /// No watcher is notified. If that evaluation fails the error is
    /// returned, but the getter stays registered.
    pub fn add_getter<F>(&mut self, path: impl Into<String>, getter: F) -> Result<(), MembrainError>
    where
        F: Fn(ReadView<'_>) -> anyhow::Result<Value> + 'static,
    {
        let path = path.into();
        self.core.registry.add_getter(path.clone(), Rc::new(getter));
        if self.core.config.prime_getters {
            self.core.evaluate(&path)?;
        }
        Ok(())
    }

    /// Unregister the getter at `path`. Returns `false` if there was none.
    ///
    /// Dependencies it already recorded stay in the index; a later write to
    /// one of them fails with [`MembrainError::UnknownGetter`].
    pub fn remove_getter(&mut self, path: &str) -> bool {
        self.core.registry.remove_getter(path)
    }

    /// Whether a getter is registered at `path`.
    pub fn has_getter(&self, path: &str) -> bool {
        self.core.registry.getter(path).is_some()
    }

    /// Subscribe `watcher` to the getter at `path`.
    ///
    /// Watchers at the same path are called in subscription order.
    pub fn watch<F>(&mut self, path: impl Into<String>, watcher: F) -> WatcherId
    where
        F: FnMut(&Value) + 'static,
    {
        self.core.registry.watch(path.into(), Box::new(watcher))
    }

    /// Remove a watcher. Returns `false` if it was already removed.
    pub fn unwatch(&mut self, id: WatcherId) -> bool {
        self.core.registry.unwatch(id)
    }

    /// Number of watchers subscribed to `path`.
    pub fn watcher_count(&self, path: &str) -> usize {
        self.core.registry.watcher_count(path)
    }

    /// Run the action at `path` with `payload`.
    ///
    /// Every write the action makes propagates before the write returns. An
    /// error from the action, or from a getter it triggered, is returned
    /// as-is; writes made before it stay applied.
    pub fn dispatch(&mut self, path: &str, payload: impl Into<Value>) -> Result<(), MembrainError> {
        self.core.dispatch(path, &payload.into())
    }

    /// Evaluate the getter at `path` and call its watchers with the result.
    pub fn trigger_update(&mut self, path: &str) -> Result<(), MembrainError> {
        self.core.trigger_update(path)
    }

    /// Evaluate the getter at `path` and return its value.
    ///
    /// The evaluation records dependencies like any other. The returned value
    /// is detached from the state tree.
    pub fn get(&self, path: &str) -> Result<Value, MembrainError> {
        self.core.evaluate(path)
    }

    /// Detached copy of the whole state tree. Records nothing.
    pub fn state(&self) -> Value {
        materialize(&self.core.store, self.core.store.root())
    }

    /// Identity of the root node.
    pub fn root(&self) -> NodeId {
        self.core.store.root()
    }

    /// Properties currently recorded for the getter at `path`, in the order
    /// they were first read.
    pub fn dependencies(&self, path: &str) -> Vec<Dependency> {
        self.core.index.borrow().dependencies_of(path)
    }

    /// Number of nodes in the arena, including unreachable ones not yet
    /// collected.
    pub fn node_count(&self) -> usize {
        self.core.store.len()
    }

    /// Free nodes no longer reachable from the root, along with every
    /// dependency recorded against them. Returns how many nodes were freed.
    ///
    /// Ids of freed nodes may be reused by later allocations.
    pub fn collect_garbage(&mut self) -> usize {
        let dead = self.core.store.collect_garbage();
        self.core.index.get_mut().purge(&dead);
        self.core.tracer.on_garbage_collected(dead.len());
        dead.len()
    }
}

impl fmt::Debug for Membrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Membrain")
            .field("config", &self.core.config)
            .field("nodes", &self.core.store.len())
            .field("dependencies", &self.core.index.borrow().len())
            .finish()
    }
}

/// Builder for [`Membrain`].
pub struct MembrainBuilder {
    config: MembrainConfig,
    tracer: Arc<dyn Tracer>,
    state: Map<String, Value>,
}

impl Default for MembrainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MembrainBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: MembrainConfig::default(),
            tracer: Arc::new(NoopTracer),
            state: Map::new(),
        }
    }

    /// Replace all settings at once.
    pub fn config(mut self, config: MembrainConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the dependency tracking mode.
    ///
    /// The default, [`DependencyTracking::Accumulate`], never drops a
    /// dependency.
    pub fn tracking(mut self, tracking: DependencyTracking) -> Self {
        self.config.tracking = tracking;
        self
    }

    /// Whether getters are evaluated once on registration (default `true`).
    pub fn prime_getters(mut self, prime: bool) -> Self {
        self.config.prime_getters = prime;
        self
    }

    /// Set the tracer.
    pub fn tracer(self, tracer: impl Tracer) -> Self {
        self.tracer_arc(Arc::new(tracer))
    }

    /// Set a shared tracer.
    pub fn tracer_arc(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Seed the root map.
    pub fn initial_state(mut self, state: Map<String, Value>) -> Self {
        self.state = state;
        self
    }

    /// Build the container.
    pub fn build(self) -> Membrain {
        Membrain {
            core: Core {
                store: Store::new(self.state),
                index: RefCell::new(DependencyIndex::new()),
                registry: Registry::new(),
                tracer: self.tracer,
                config: self.config,
            },
        }
    }
}
