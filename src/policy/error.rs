use thiserror::Error;

use crate::query::ParseError;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid query JSON format")]
    MalformedRequest(#[from] ParseError),

    #[error("{0}")]
    MissingTenantScope(String),

    #[error("Query must include a filter on '{field}' with operator '=='")]
    MissingTenancyRoot { field: &'static str },
}
