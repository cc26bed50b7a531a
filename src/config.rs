use std::fmt;
use std::sync::Arc;

use crate::coordinator::{BackendFactory, BackendOptions, Coordinator};
use crate::scope::Scope;

/// How a provider obtains its manager.
///
/// Equality follows what matters for caching a resolution: identity of the
/// manager, backend and scope, value of the options and debug flag.
#[derive(Clone)]
pub enum ProviderConfig {
    /// Use this manager as-is. The caller owns its lifetime.
    Manager(Coordinator),
    /// Share a singleton manager built from a backend.
    Backend(BackendConfig),
}

impl ProviderConfig {
    pub fn manager(coordinator: Coordinator) -> Self {
        Self::Manager(coordinator)
    }

    pub fn backend(backend: BackendFactory) -> Self {
        Self::Backend(BackendConfig::new(backend))
    }
}

impl From<BackendConfig> for ProviderConfig {
    fn from(config: BackendConfig) -> Self {
        Self::Backend(config)
    }
}

impl PartialEq for ProviderConfig {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Manager(a), Self::Manager(b)) => a.ptr_eq(b),
            (Self::Backend(a), Self::Backend(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manager(m) => f.debug_tuple("Manager").field(m).finish(),
            Self::Backend(b) => f.debug_tuple("Backend").field(b).finish(),
        }
    }
}

#[derive(Clone)]
pub struct BackendConfig {
    pub backend: BackendFactory,
    /// Where to keep the singleton. `None` means the registry's default scope,
    /// which is reference counted and cleared after the last unmount.
    pub scope: Option<Scope>,
    pub options: Option<BackendOptions>,
    pub debug: bool,
}

impl BackendConfig {
    pub fn new(backend: BackendFactory) -> Self {
        Self { backend, scope: None, options: None, debug: false }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_options(mut self, options: BackendOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl PartialEq for BackendConfig {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
            && self.scope == other.scope
            && self.options == other.options
            && self.debug == other.debug
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("backend", &self.backend.name())
            .field("scope", &self.scope)
            .field("options", &self.options)
            .field("debug", &self.debug)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Backend;
    use serde_json::json;

    struct Html5;
    impl Backend for Html5 {
        fn name(&self) -> &'static str { "html5" }
        fn create_manager(&self, _: &Scope, _: Option<&BackendOptions>, _: bool) -> Coordinator {
            Coordinator::new(())
        }
    }

    #[test]
    fn equality_by_identity_and_value() {
        let backend: BackendFactory = Arc::new(Html5);
        let scope = Scope::new("s");
        let a = BackendConfig::new(backend.clone())
            .with_scope(scope.clone())
            .with_options(json!({"rootElement": "body"}));
        let b = BackendConfig::new(backend.clone())
            .with_scope(scope)
            .with_options(json!({"rootElement": "body"}));
        assert_eq!(ProviderConfig::from(a.clone()), ProviderConfig::from(b));

        let other_backend: BackendFactory = Arc::new(Html5);
        assert_ne!(a.clone(), BackendConfig { backend: other_backend, ..a.clone() });
        assert_ne!(a.clone(), a.clone().with_debug(true));
        assert_ne!(a.clone(), BackendConfig { scope: Some(Scope::new("s")), ..a });
    }

    #[test]
    fn manager_and_backend_never_equal() {
        let backend: BackendFactory = Arc::new(Html5);
        let manager = Coordinator::new(());
        assert_ne!(ProviderConfig::manager(manager.clone()), ProviderConfig::backend(backend));
        assert_eq!(ProviderConfig::manager(manager.clone()), ProviderConfig::manager(manager));
    }
}
