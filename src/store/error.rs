use thiserror::Error;

/// Errors from document store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("Operator '{operator}' on field '{field}' requires an array value")]
    InvalidOperand { field: String, operator: &'static str },

    #[error("Query timed out after {0}ms")]
    Timeout(u64),

    #[error("Failed to load seed documents: {0}")]
    Seed(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
