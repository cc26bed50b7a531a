use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

// The process-wide ambient scope, built on first access.
static AMBIENT: Lazy<Scope> = Lazy::new(|| Scope::new("global"));

/// Process-unique identity of a [`Scope`]. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub fn get(self) -> u64 {
        self.0
    }
}

struct ScopeInner {
    id: ScopeId,
    label: String,
}

/// An object a singleton manager can be stored against.
///
/// Clones share identity: two `Scope`s are the same scope exactly when one
/// was cloned from the other. The label is only for logs and snapshots.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub fn new(label: impl Into<String>) -> Self {
        let id = ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Arc::new(ScopeInner { id, label: label.into() }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Weak reference used by the registry to notice scopes nobody owns anymore.
    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Arc::downgrade(&self.inner))
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({}#{})", self.inner.label, self.inner.id.0)
    }
}

#[derive(Clone)]
pub(crate) struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// The ambient scope shared by the whole process.
///
/// Always the same object; used as the default storage location when a
/// provider is configured without a scope of its own.
pub fn ambient() -> &'static Scope {
    &AMBIENT
}
