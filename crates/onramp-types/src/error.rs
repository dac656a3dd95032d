use thiserror::Error;

/// Errors related to employee operations.
#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error("employee not found")]
    NotFound,

    #[error("employee with email '{0}' already exists")]
    EmailConflict(String),

    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("invalid employee name: {0}")]
    InvalidName(String),

    #[error("start_date must be in YYYY-MM-DD format, got '{0}'")]
    InvalidStartDate(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors from repository operations (used by trait definitions in onramp-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
