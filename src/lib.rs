#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

#[cfg(feature = "collector")]
mod collector;
mod error;
mod index;
mod key;
mod node;
mod read;
mod registry;
mod runtime;
mod snapshot;
mod store;
pub mod tracer;
mod write;

#[cfg(feature = "collector")]
pub use collector::{EventCollector, TraceEvent};
pub use error::MembrainError;
pub use index::Dependency;
pub use key::{Key, NodeId, NodeKind};
pub use node::{ReadableNode, WritableNode};
pub use read::{Entry, ReadView};
pub use registry::{Action, Getter, WatcherId};
pub use runtime::{DependencyTracking, Membrain, MembrainBuilder, MembrainConfig};
pub use tracer::{NoopTracer, Tracer};
pub use write::WriteView;
