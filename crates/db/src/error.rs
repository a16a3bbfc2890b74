//! Error type returned by every tree manager operation.

use curriculum_core::error::CoreError;

/// SQLSTATE codes for failures that are safe to retry as a whole operation.
const RETRYABLE_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available (lock_timeout)
    "57014", // query_canceled (statement_timeout)
    "23505", // unique_violation (lost a sibling-order race)
];

/// SQLSTATE codes for foreign-key and check violations.
const CONSTRAINT_SQLSTATES: &[&str] = &[
    "23503", // foreign_key_violation
    "23514", // check_violation
];

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A domain-level failure: not found, invalid state, constraint, validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The transaction was aborted by the store (deadlock, lock timeout,
    /// serialization failure, pool exhaustion). Nothing was persisted.
    #[error("Transient store error: {0}")]
    TransientStore(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

/// Convenience type alias for tree manager return values.
pub type TreeResult<T> = Result<T, TreeError>;

impl TreeError {
    /// Whether the caller may safely re-run the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TreeError::TransientStore(_))
    }

    /// Whether this is a `NotFound` domain error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreeError::Core(CoreError::NotFound { .. }))
    }
}

impl From<sqlx::Error> for TreeError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => TreeError::TransientStore(err),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                let code = code.as_deref().unwrap_or_default();
                if RETRYABLE_SQLSTATES.contains(&code) {
                    TreeError::TransientStore(err)
                } else if CONSTRAINT_SQLSTATES.contains(&code) {
                    let constraint = db_err.constraint().unwrap_or("unknown");
                    TreeError::Core(CoreError::ConstraintViolation(format!(
                        "Violates constraint {constraint}: {}",
                        db_err.message()
                    )))
                } else {
                    TreeError::Database(err)
                }
            }
            _ => TreeError::Database(err),
        }
    }
}
