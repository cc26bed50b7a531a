// Singleton slots keyed by scope identity, plus the reference count of the
// default scope. Production code shares `DndRegistry::global`; tests build their own.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use crate::context::ManagerHandle;
use crate::coordinator::Coordinator;
use crate::scope::{self, Scope, ScopeId, WeakScope};

static GLOBAL_REGISTRY: Lazy<Arc<DndRegistry>> = Lazy::new(|| Arc::new(DndRegistry::new()));

/// Count of mounted consumers relying on the default scope.
#[derive(Debug, Default)]
pub(crate) struct RefCounter {
    count: usize,
}

impl RefCounter {
    pub(crate) fn increment(&mut self) -> usize {
        self.count += 1;
        self.count
    }

    /// Must be paired with an earlier `increment`.
    pub(crate) fn decrement(&mut self) -> usize {
        debug_assert!(self.count > 0, "unpaired reference count decrement");
        if self.count == 0 {
            warn!("unpaired reference count decrement ignored");
            return 0;
        }
        self.count -= 1;
        self.count
    }

    pub(crate) fn get(&self) -> usize {
        self.count
    }
}

struct Slot {
    scope: WeakScope,
    label: String,
    handle: ManagerHandle,
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<ScopeId, Slot>,
    refs: RefCounter,
}

impl RegistryState {
    // Drop slots whose scope no owner can name anymore.
    fn prune(&mut self) {
        self.slots.retain(|id, slot| {
            let alive = slot.scope.is_alive();
            if !alive {
                debug!(scope = %slot.label, scope_id = id.get(), "pruned slot of dropped scope");
            }
            alive
        });
    }
}

/// Scope-keyed store of singleton managers.
pub struct DndRegistry {
    default_scope: Scope,
    state: Mutex<RegistryState>,
}

impl Default for DndRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DndRegistry {
    /// A registry whose default scope is the process ambient scope.
    pub fn new() -> Self {
        Self::with_default_scope(scope::ambient().clone())
    }

    pub fn with_default_scope(default_scope: Scope) -> Self {
        Self {
            default_scope,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// The registry shared by every provider that was not handed one.
    pub fn global() -> Arc<DndRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn default_scope(&self) -> &Scope {
        &self.default_scope
    }

    // Every operation leaves the state consistent, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the handle stored for `scope`, building it with `factory` if
    /// the slot is empty.
    ///
    /// `factory` runs at most once per empty slot, under the registry lock,
    /// so it must not call back into this registry.
    pub fn get_or_create<F>(&self, scope: &Scope, factory: F) -> ManagerHandle
    where
        F: FnOnce() -> Coordinator,
    {
        let mut state = self.lock();
        if let Some(slot) = state.slots.get(&scope.id()) {
            trace!(?scope, "reusing singleton manager");
            return slot.handle.clone();
        }
        state.prune();
        let handle = ManagerHandle::new(factory());
        state.slots.insert(
            scope.id(),
            Slot {
                scope: scope.downgrade(),
                label: scope.label().to_owned(),
                handle: handle.clone(),
            },
        );
        debug!(?scope, "stored singleton manager");
        handle
    }

    pub fn get(&self, scope: &Scope) -> Option<ManagerHandle> {
        self.lock().slots.get(&scope.id()).map(|slot| slot.handle.clone())
    }

    pub fn contains(&self, scope: &Scope) -> bool {
        self.lock().slots.contains_key(&scope.id())
    }

    /// Empty the slot of `scope`. The next `get_or_create` builds a new manager.
    pub fn clear(&self, scope: &Scope) -> Option<ManagerHandle> {
        let removed = self.lock().slots.remove(&scope.id()).map(|slot| slot.handle);
        if removed.is_some() {
            debug!(?scope, "cleared singleton manager");
        }
        removed
    }

    pub fn ref_count(&self) -> usize {
        self.lock().refs.get()
    }

    /// Register one consumer of the default scope singleton.
    ///
    /// The default slot is cleared when the last outstanding lease is dropped.
    pub fn lease_default(self: &Arc<Self>) -> DefaultScopeLease {
        let count = self.lock().refs.increment();
        debug!(count, "acquired default scope lease");
        DefaultScopeLease {
            registry: Arc::clone(self),
        }
    }

    fn release_default(&self) {
        let mut state = self.lock();
        let count = state.refs.decrement();
        debug!(count, "released default scope lease");
        if count == 0 && state.slots.remove(&self.default_scope.id()).is_some() {
            debug!(scope = ?self.default_scope, "last consumer gone, cleared default singleton");
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.lock();
        let mut scopes: Vec<SlotSnapshot> = state
            .slots
            .iter()
            .map(|(id, slot)| SlotSnapshot {
                scope_id: id.get(),
                scope: slot.label.clone(),
            })
            .collect();
        scopes.sort_by_key(|s| s.scope_id);
        RegistrySnapshot {
            ref_count: state.refs.get(),
            default_populated: state.slots.contains_key(&self.default_scope.id()),
            scopes,
        }
    }
}

/// Held by a mounted consumer of the default scope singleton.
///
/// Dropping the lease releases it, including during unwinding.
#[must_use = "dropping the lease releases it immediately"]
pub struct DefaultScopeLease {
    registry: Arc<DndRegistry>,
}

impl DefaultScopeLease {
    pub fn registry(&self) -> &Arc<DndRegistry> {
        &self.registry
    }
}

impl Drop for DefaultScopeLease {
    fn drop(&mut self) {
        self.registry.release_default();
    }
}

/// Point-in-time view of a registry, for diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub ref_count: usize,
    pub default_populated: bool,
    pub scopes: Vec<SlotSnapshot>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub scope_id: u64,
    pub scope: String,
}
