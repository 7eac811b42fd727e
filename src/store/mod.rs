pub mod error;
pub mod eval;
pub mod memory;
pub mod postgres;
pub mod sql;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::{StoreBackend, StoreConfig};
use crate::policy::SecureQuery;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A stored document as returned to the caller
pub type Document = Map<String, Value>;

/// Executes policy-compliant queries against a document collection.
///
/// Implementations apply filters in submitted order with AND semantics,
/// then ordering, then the limit.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, collection: &str, query: &SecureQuery) -> Result<Vec<Document>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    fn name(&self) -> &'static str;
}

/// Build the backend selected in configuration
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(config).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            let store = match &config.seed_path {
                Some(path) => MemoryStore::from_seed_file(path, config.max_limit).await?,
                None => MemoryStore::new(config.max_limit),
            };
            Ok(Arc::new(store))
        }
    }
}

/// Collection names become part of the request path and a bound SQL
/// parameter; only identifier-like names are accepted.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(StoreError::InvalidCollection(name.to_string()));
    }
    Ok(())
}

/// Explicit client limit capped at the configured maximum; no limit means
/// the full filtered set
pub fn effective_limit(requested: Option<u32>, max_limit: Option<u32>) -> Option<u32> {
    match (requested, max_limit) {
        (Some(l), Some(max)) if l > max => {
            tracing::warn!("Limit {} exceeds max {}, capping to max", l, max);
            Some(max)
        }
        (requested, _) => requested,
    }
}
