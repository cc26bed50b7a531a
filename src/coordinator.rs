use serde_json::Value;
use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::errors::{DndError, Result};
use crate::scope::Scope;

/// Free-form options handed through to the backend untouched.
pub type BackendOptions = Value;

/// Opaque reference to a drag-drop manager.
///
/// Only identity matters to this crate; consumers that know the concrete
/// manager type can reach it with [`Coordinator::downcast`].
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Coordinator {
    pub fn new<T: Any + Send + Sync>(manager: T) -> Self {
        Self { inner: Arc::new(manager) }
    }

    pub fn ptr_eq(&self, other: &Coordinator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast<T: Any>(&self) -> Result<&T> {
        self.downcast_ref::<T>().ok_or(DndError::CoordinatorType {
            expected: any::type_name::<T>(),
        })
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coordinator({:p})", Arc::as_ptr(&self.inner).cast::<()>())
    }
}

/// Trait for pluggable drag-and-drop backends.
///
/// A backend knows how to build a manager bound to the pointer/touch events
/// of a scope. Every call builds a new manager.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;
    fn create_manager(&self, scope: &Scope, options: Option<&BackendOptions>, debug_mode: bool) -> Coordinator;
}

pub type BackendFactory = Arc<dyn Backend>;

/// Build a fresh coordinator. Not idempotent; the registry guards it.
pub fn create_coordinator(
    backend: &BackendFactory,
    scope: &Scope,
    options: Option<&BackendOptions>,
    debug_mode: bool,
) -> Coordinator {
    let coordinator = backend.create_manager(scope, options, debug_mode);
    debug!(backend = backend.name(), ?scope, debug_mode, "created drag-drop coordinator");
    coordinator
}
