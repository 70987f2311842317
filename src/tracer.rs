//! Tracer trait for observing dispatch and propagation.
//!
//! The default [`NoopTracer`] discards everything. Implement [`Tracer`] to
//! forward events to a logging backend, or use the
//! [`EventCollector`](crate::EventCollector) (behind the `collector` feature)
//! to record them for assertions.
//!
//! # Example
//!
//! ```
//! use membrain::{Membrain, Tracer};
//!
//! struct PrintTracer;
//!
//! impl Tracer for PrintTracer {
//!     fn on_dispatch_start(&self, action: &str) {
//!         println!("dispatch {action}");
//!     }
//! }
//!
//! let membrain = Membrain::builder().tracer(PrintTracer).build();
//! # let _ = membrain;
//! ```

use crate::key::{Key, NodeId};
use crate::registry::WatcherId;

/// Tracer trait for observing a container.
///
/// All methods have empty default implementations, so only the events of
/// interest need overriding.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single tracer can be shared by
/// containers living on different threads.
pub trait Tracer: Send + Sync + 'static {
    /// Called before an action runs.
    #[inline]
    fn on_dispatch_start(&self, _action: &str) {}

    /// Called after an action returned, successfully or not.
    #[inline]
    fn on_dispatch_end(&self, _action: &str, _ok: bool) {}

    /// Called when a getter reads a property it was not yet recorded against.
    #[inline]
    fn on_dependency_recorded(&self, _getter: &str, _node: NodeId, _key: &Key) {}

    /// Called when a getter's dependencies are dropped before re-evaluation.
    #[inline]
    fn on_dependencies_forgotten(&self, _getter: &str, _count: usize) {}

    /// Called after a write, with the getters about to be re-evaluated.
    #[inline]
    fn on_write(&self, _node: NodeId, _key: &Key, _affected: &[String]) {}

    /// Called when a getter attempted to write through its read view.
    #[inline]
    fn on_write_rejected(&self, _getter: &str, _node: NodeId, _key: &Key) {}

    /// Called after a getter evaluation.
    #[inline]
    fn on_getter_evaluated(&self, _getter: &str, _ok: bool) {}

    /// Called after a watcher callback returned.
    #[inline]
    fn on_watcher_notified(&self, _path: &str, _watcher: WatcherId) {}

    /// Called after an explicit garbage collection.
    #[inline]
    fn on_garbage_collected(&self, _freed: usize) {}
}

/// Zero-cost tracer that discards all events.
///
/// This is the default tracer for [`Membrain`](crate::Membrain).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}
