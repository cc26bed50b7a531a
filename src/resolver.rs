use crate::config::ProviderConfig;
use crate::context::ManagerHandle;
use crate::coordinator::create_coordinator;
use crate::registry::DndRegistry;

/// Outcome of resolving a provider configuration.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub handle: ManagerHandle,
    /// True when the handle lives in the registry's default scope, i.e. the
    /// consumer must hold a lease while mounted.
    pub is_default_scope_singleton: bool,
}

/// Turn a configuration into the handle a provider publishes.
///
/// Safe to call repeatedly: a backend configuration only builds a
/// coordinator when its scope's slot is empty.
pub fn resolve(registry: &DndRegistry, config: &ProviderConfig) -> Resolved {
    match config {
        ProviderConfig::Manager(manager) => Resolved {
            handle: ManagerHandle::new(manager.clone()),
            is_default_scope_singleton: false,
        },
        ProviderConfig::Backend(cfg) => {
            let scope = cfg.scope.as_ref().unwrap_or_else(|| registry.default_scope());
            let handle = registry.get_or_create(scope, || {
                create_coordinator(&cfg.backend, scope, cfg.options.as_ref(), cfg.debug)
            });
            Resolved {
                handle,
                is_default_scope_singleton: cfg.scope.is_none(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::coordinator::{Backend, BackendFactory, BackendOptions, Coordinator};
    use crate::scope::Scope;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, Option<BackendOptions>, bool)>>,
    }

    impl Backend for Recording {
        fn name(&self) -> &'static str { "recording" }
        fn create_manager(&self, scope: &Scope, options: Option<&BackendOptions>, debug_mode: bool) -> Coordinator {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((scope.label().to_string(), options.cloned(), debug_mode));
            Coordinator::new(())
        }
    }

    fn registry() -> DndRegistry {
        DndRegistry::with_default_scope(Scope::new("default"))
    }

    #[test]
    fn explicit_manager_bypasses_registry() {
        let registry = registry();
        let manager = Coordinator::new("external");
        let config = ProviderConfig::manager(manager.clone());
        let a = resolve(&registry, &config);
        let b = resolve(&registry, &config);
        assert!(!a.is_default_scope_singleton);
        assert!(a.handle.coordinator().ptr_eq(&manager));
        assert!(b.handle.coordinator().ptr_eq(&manager));
        assert!(registry.snapshot().scopes.is_empty());
    }

    #[test]
    fn backend_without_scope_uses_default_slot() {
        let registry = registry();
        let backend = Arc::new(Recording::default());
        let factory: BackendFactory = backend.clone();
        let config = ProviderConfig::backend(factory);
        let a = resolve(&registry, &config);
        let b = resolve(&registry, &config);
        assert!(a.is_default_scope_singleton);
        assert!(a.handle.ptr_eq(&b.handle));
        assert!(registry.contains(registry.default_scope()));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backend_receives_scope_options_and_debug() {
        let registry = registry();
        let backend = Arc::new(Recording::default());
        let factory: BackendFactory = backend.clone();
        let config: ProviderConfig = BackendConfig::new(factory)
            .with_scope(Scope::new("canvas"))
            .with_options(json!({"enableMouseEvents": true}))
            .with_debug(true)
            .into();
        let resolved = resolve(&registry, &config);
        assert!(!resolved.is_default_scope_singleton);
        let seen = backend.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![("canvas".to_string(), Some(json!({"enableMouseEvents": true})), true)]
        );
    }
}
