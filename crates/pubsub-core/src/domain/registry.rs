//! # Named Registry
//!
//! Name-keyed store for pluggable units (external providers, realtime
//! transports). The host registers units as plugins load; consumers look the
//! active one up by its configured name.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything registrable by name.
pub trait Named {
    fn name(&self) -> &str;
}

/// Registered units in registration order.
pub struct NamedRegistry<T: ?Sized + Named> {
    entries: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized + Named> NamedRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a unit, replacing any unit already registered under its name.
    pub fn register(&self, unit: Arc<T>) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|existing| existing.name() != unit.name());
        if entries.len() != before {
            warn!(name = unit.name(), "Unit already registered, replacing");
        }
        debug!(name = unit.name(), "Registered unit");
        entries.push(unit);
    }

    /// Remove a unit by name, returning it if it was registered.
    pub fn unregister(&self, name: &str) -> Option<Arc<T>> {
        let mut entries = self.entries.write();
        let index = entries.iter().position(|unit| unit.name() == name)?;
        debug!(name, "Unregistered unit");
        Some(entries.remove(index))
    }

    pub fn find(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .iter()
            .find(|unit| unit.name() == name)
            .cloned()
    }

    /// Snapshot of all registered units.
    pub fn providers(&self) -> Vec<Arc<T>> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: ?Sized + Named> Default for NamedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
