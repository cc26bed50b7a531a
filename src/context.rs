use std::fmt;
use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::errors::{DndError, Result};

/// The value a provider publishes to its subtree: `{ coordinator }`.
///
/// Immutable once built. Two handles are the same handle only if one was
/// cloned from the other; compare with [`ManagerHandle::ptr_eq`].
#[derive(Clone)]
pub struct ManagerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    coordinator: Coordinator,
}

impl ManagerHandle {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            inner: Arc::new(HandleInner { coordinator }),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.inner.coordinator
    }

    pub fn ptr_eq(&self, other: &ManagerHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerHandle")
            .field("coordinator", &self.inner.coordinator)
            .finish()
    }
}

/// What descendants of a provider see.
///
/// The default value stands for "no provider above this component".
#[derive(Clone, Debug, Default)]
pub struct DndContext {
    handle: Option<ManagerHandle>,
}

impl DndContext {
    pub fn new(handle: ManagerHandle) -> Self {
        Self { handle: Some(handle) }
    }

    pub fn handle(&self) -> Option<&ManagerHandle> {
        self.handle.as_ref()
    }

    /// The coordinator of the nearest provider, or `MissingContext`.
    pub fn drag_drop_manager(&self) -> Result<&Coordinator> {
        self.handle
            .as_ref()
            .map(ManagerHandle::coordinator)
            .ok_or(DndError::MissingContext)
    }
}
