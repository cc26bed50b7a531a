pub mod errors;
pub mod scope;
pub mod coordinator;
pub mod context;
pub mod registry;
pub mod config;
pub mod resolver;
pub mod provider;

pub use errors::{DndError, Result};
pub use scope::{ambient, Scope, ScopeId};
pub use coordinator::{create_coordinator, Backend, BackendFactory, BackendOptions, Coordinator};
pub use context::{DndContext, ManagerHandle};
pub use registry::{DefaultScopeLease, DndRegistry, RegistrySnapshot, SlotSnapshot};
pub use config::{BackendConfig, ProviderConfig};
pub use resolver::{resolve, Resolved};
pub use provider::DndProvider;

/// Convenience: resolve `config` against the process-wide registry.
pub fn resolve_global(config: &ProviderConfig) -> Resolved {
    resolve(&DndRegistry::global(), config)
}
