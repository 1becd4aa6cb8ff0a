//! # In-Process Plugin Host
//!
//! Minimal host side of the lifecycle contract: keeps the pending one-shot
//! load/unload callbacks per unit name and fires them when the unit is
//! reported loaded or unloaded.
//!
//! Pending callbacks are drained before any of them runs, so a callback may
//! re-arm itself for the next event without deadlocking or firing twice.

use crate::domain::registry::{Named, NamedRegistry};
use crate::ports::outbound::{LifecycleCallback, LifecycleNotifier};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct PendingCallbacks {
    load: Vec<LifecycleCallback>,
    unload: Vec<LifecycleCallback>,
}

#[derive(Default)]
pub struct PluginHost {
    pending: Mutex<HashMap<String, PendingCallbacks>>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the pending load callbacks of `name`. Returns how many ran.
    pub fn notify_loaded(&self, name: &str) -> usize {
        let callbacks = {
            let mut pending = self.pending.lock();
            pending
                .get_mut(name)
                .map(|p| std::mem::take(&mut p.load))
                .unwrap_or_default()
        };
        info!(unit = name, callbacks = callbacks.len(), "Unit loaded");
        Self::fire(callbacks)
    }

    /// Fire the pending unload callbacks of `name`. Returns how many ran.
    pub fn notify_unloaded(&self, name: &str) -> usize {
        let callbacks = {
            let mut pending = self.pending.lock();
            pending
                .get_mut(name)
                .map(|p| std::mem::take(&mut p.unload))
                .unwrap_or_default()
        };
        info!(unit = name, callbacks = callbacks.len(), "Unit unloaded");
        Self::fire(callbacks)
    }

    /// Register `unit` in `registry`, then announce it as loaded.
    pub fn load<T: ?Sized + Named>(&self, registry: &NamedRegistry<T>, unit: Arc<T>) {
        let name = unit.name().to_string();
        registry.register(unit);
        self.notify_loaded(&name);
    }

    /// Remove `name` from `registry`, then announce it as unloaded.
    pub fn unload<T: ?Sized + Named>(&self, registry: &NamedRegistry<T>, name: &str) {
        registry.unregister(name);
        self.notify_unloaded(name);
    }

    pub fn pending_load_callbacks(&self, name: &str) -> usize {
        self.pending.lock().get(name).map_or(0, |p| p.load.len())
    }

    pub fn pending_unload_callbacks(&self, name: &str) -> usize {
        self.pending.lock().get(name).map_or(0, |p| p.unload.len())
    }

    fn fire(callbacks: Vec<LifecycleCallback>) -> usize {
        let count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        count
    }
}

impl LifecycleNotifier for PluginHost {
    fn on_next_load(&self, name: &str, callback: LifecycleCallback) {
        debug!(unit = name, "Armed one-shot load callback");
        self.pending
            .lock()
            .entry(name.to_string())
            .or_default()
            .load
            .push(callback);
    }

    fn on_next_unload(&self, name: &str, callback: LifecycleCallback) {
        debug!(unit = name, "Armed one-shot unload callback");
        self.pending
            .lock()
            .entry(name.to_string())
            .or_default()
            .unload
            .push(callback);
    }
}
