use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::ProviderConfig;
use crate::context::DndContext;
use crate::registry::{DefaultScopeLease, DndRegistry};
use crate::resolver::{resolve, Resolved};

enum ProviderState {
    Unmounted,
    Mounted { lease: Option<DefaultScopeLease> },
}

/// A mountable unit publishing a drag-drop context to its subtree.
///
/// Resolution happens when the provider is built and again whenever
/// [`render`](DndProvider::render) sees a different configuration. A provider
/// resolved to the default scope singleton holds a lease while mounted;
/// dropping a mounted provider unmounts it.
pub struct DndProvider {
    registry: Arc<DndRegistry>,
    config: ProviderConfig,
    resolved: Resolved,
    state: ProviderState,
}

impl DndProvider {
    /// A provider backed by the process-wide registry.
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_registry(DndRegistry::global(), config)
    }

    pub fn with_registry(registry: Arc<DndRegistry>, config: ProviderConfig) -> Self {
        let resolved = resolve(&registry, &config);
        Self {
            registry,
            config,
            resolved,
            state: ProviderState::Unmounted,
        }
    }

    pub fn registry(&self) -> &Arc<DndRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.state, ProviderState::Mounted { .. })
    }

    pub fn is_default_scope_singleton(&self) -> bool {
        self.resolved.is_default_scope_singleton
    }

    /// The value to publish to descendants.
    pub fn context(&self) -> DndContext {
        DndContext::new(self.resolved.handle.clone())
    }

    /// Re-render with `config`. An unchanged configuration reuses the cached
    /// resolution.
    pub fn render(&mut self, config: ProviderConfig) -> DndContext {
        if config == self.config {
            trace!("configuration unchanged, reusing resolution");
            return self.context();
        }
        debug!(?config, "configuration changed, resolving again");
        self.resolved = resolve(&self.registry, &config);
        self.config = config;
        self.sync_lease();
        self.context()
    }

    /// Attach the provider. Calling it while already mounted does nothing.
    pub fn mount(&mut self) {
        if self.is_mounted() {
            trace!("mount ignored, provider already mounted");
            return;
        }
        self.state = ProviderState::Mounted { lease: None };
        self.sync_lease();
        debug!(default_scope = self.resolved.is_default_scope_singleton, "provider mounted");
    }

    /// Detach the provider, releasing its lease if it holds one.
    pub fn unmount(&mut self) {
        if let ProviderState::Mounted { lease } = std::mem::replace(&mut self.state, ProviderState::Unmounted) {
            drop(lease);
            debug!("provider unmounted");
        }
    }

    // Keep lease ownership in line with the current resolution while mounted.
    fn sync_lease(&mut self) {
        let ProviderState::Mounted { lease } = &mut self.state else {
            return;
        };
        match (self.resolved.is_default_scope_singleton, lease.is_some()) {
            (true, false) => {
                *lease = Some(self.registry.lease_default());
                // The default slot may have been emptied between resolution and
                // the lease; nothing can empty it while the lease is held.
                let current = self.registry.get(self.registry.default_scope());
                if !current.is_some_and(|h| h.ptr_eq(&self.resolved.handle)) {
                    debug!("default singleton replaced before mount, resolving again");
                    self.resolved = resolve(&self.registry, &self.config);
                }
            }
            (false, true) => *lease = None,
            _ => {}
        }
    }
}
