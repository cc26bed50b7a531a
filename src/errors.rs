use thiserror::Error;

/// Errors surfaced to consumers of a published drag-and-drop context.
#[derive(Debug, Error)]
pub enum DndError {
    // No provider above the consumer published a manager
    #[error("expected a drag-drop context; wrap the component in a DndProvider")]
    MissingContext,

    // The opaque coordinator is not of the requested concrete type
    #[error("coordinator is not a `{expected}`")]
    CoordinatorType { expected: &'static str },
}

pub type Result<T> = std::result::Result<T, DndError>;
