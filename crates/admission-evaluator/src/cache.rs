//! Lookup tables filled by the cluster watchers.
//!
//! The admission decisions only ever read them, through the [`NamespaceLookup`]
//! and [`PriorityClassLookup`] traits. Writes are reserved to whoever owns the
//! concrete cache, typically a Kubernetes watcher running in the background.

pub mod namespace;
pub mod priority_class;

pub use namespace::{NamespaceCache, NamespaceFlag, NamespaceFlags, NamespaceLookup};
pub use priority_class::{PriorityClassCache, PriorityClassLookup};
