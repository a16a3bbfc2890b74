use crate::types::DbId;

/// Domain-level failures shared by every tree operation.
///
/// Transport- and store-level failures live in `curriculum_db::error::TreeError`,
/// which wraps this type.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The entity does not exist or is soft-deleted.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// The operation does not apply to the entity's current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The operation would break a tree invariant.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing or soft-deleted node.
    pub fn node_not_found(id: DbId) -> Self {
        CoreError::NotFound { entity: "Node", id }
    }
}
