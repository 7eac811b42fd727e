use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::eval;
use super::{effective_limit, validate_collection, Document, DocumentStore, StoreError};
use crate::policy::SecureQuery;

/// Collection-keyed documents held in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
    max_limit: Option<u32>,
}

impl MemoryStore {
    pub fn new(max_limit: Option<u32>) -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            max_limit,
        }
    }

    /// Load a `collection -> [documents]` map from YAML (JSON is valid YAML)
    pub async fn from_seed_file(path: &Path, max_limit: Option<u32>) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        let seed: HashMap<String, Vec<Document>> =
            serde_yaml::from_str(&raw).map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;

        let store = Self::new(max_limit);
        for (collection, documents) in seed {
            validate_collection(&collection)?;
            tracing::info!("Seeded {} documents into '{}'", documents.len(), collection);
            store.insert_many(&collection, documents).await;
        }
        Ok(store)
    }

    pub async fn insert(&self, collection: &str, document: Document) {
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().push(document);
    }

    pub async fn insert_many(&self, collection: &str, documents: impl IntoIterator<Item = Document>) {
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().extend(documents);
    }

    /// Insert a JSON object; non-object values are ignored and reported
    pub async fn insert_value(&self, collection: &str, value: Value) -> bool {
        match value {
            Value::Object(document) => {
                self.insert(collection, document).await;
                true
            }
            other => {
                tracing::warn!("Ignoring non-object document for '{}': {}", collection, other);
                false
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, collection: &str, query: &SecureQuery) -> Result<Vec<Document>, StoreError> {
        let options = query.options();
        eval::check_operands(&options.filters)?;

        let mut documents: Vec<Document> = {
            let collections = self.collections.read().await;
            collections
                .get(collection)
                .map(|docs| {
                    docs.iter()
                        .filter(|d| eval::matches_all(d, &options.filters))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        eval::sort_documents(&mut documents, &options.order_by);
        if let Some(limit) = effective_limit(options.limit, self.max_limit) {
            documents.truncate(limit as usize);
        }

        tracing::debug!("memory store matched {} documents in '{}'", documents.len(), collection);
        Ok(documents)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AuthorizationContext, AuthorizationMode, RequestScope, SecureQueryPolicy};
    use serde_json::json;

    fn admin_query(body: Value) -> SecureQuery {
        let policy = SecureQueryPolicy::new(AuthorizationMode::Role {
            privileged_role: "admin".to_string(),
        });
        let auth = AuthorizationContext::new("admin");
        let raw = serde_json::to_vec(&body).unwrap();
        policy
            .evaluate(&raw, RequestScope { auth: Some(&auth), tenant_header: None })
            .unwrap()
    }

    async fn seeded(max_limit: Option<u32>) -> MemoryStore {
        let store = MemoryStore::new(max_limit);
        for (i, sub) in ["acme", "globex", "acme", "acme"].iter().enumerate() {
            store
                .insert_value("orders", json!({"project_id": "p1", "subdomain": sub, "n": i}))
                .await;
        }
        store.insert_value("orders", json!({"project_id": "p2", "subdomain": "acme", "n": 9})).await;
        store
    }

    #[tokio::test]
    async fn fetch_applies_filters_order_and_limit() {
        let store = seeded(None).await;
        let query = admin_query(json!({
            "filters": [
                {"field": "project_id", "operator": "==", "value": "p1"},
                {"field": "subdomain", "operator": "==", "value": "acme"}
            ],
            "order_by": [{"field": "n", "direction": "desc"}],
            "limit": 2
        }));
        let docs = store.fetch("orders", &query).await.unwrap();
        let ns: Vec<_> = docs.iter().map(|d| d["n"].clone()).collect();
        assert_eq!(ns, vec![json!(3), json!(2)]);
    }

    #[tokio::test]
    async fn unlimited_query_returns_every_match() {
        let store = MemoryStore::new(Some(100));
        for i in 0..150 {
            store.insert_value("orders", json!({"project_id": "p1", "n": i})).await;
        }
        let query = admin_query(json!({"filters": [{"field": "project_id", "operator": "==", "value": "p1"}]}));
        assert_eq!(store.fetch("orders", &query).await.unwrap().len(), 150);
    }

    #[tokio::test]
    async fn explicit_limit_is_capped_at_max() {
        let store = seeded(Some(1)).await;
        let query = admin_query(json!({
            "filters": [{"field": "project_id", "operator": "==", "value": "p1"}],
            "limit": 3
        }));
        assert_eq!(store.fetch("orders", &query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_collection_is_empty() {
        let store = seeded(None).await;
        let query = admin_query(json!({"filters": [{"field": "project_id", "operator": "==", "value": "p1"}]}));
        assert!(store.fetch("invoices", &query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_non_array_operand() {
        let store = seeded(None).await;
        let query = admin_query(json!({"filters": [
            {"field": "project_id", "operator": "==", "value": "p1"},
            {"field": "subdomain", "operator": "in", "value": "acme"}
        ]}));
        let err = store.fetch("orders", &query).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperand { .. }));
    }

    #[tokio::test]
    async fn non_object_values_are_not_inserted() {
        let store = MemoryStore::new(None);
        assert!(!store.insert_value("orders", json!([1, 2])).await);
        assert!(store.insert_value("orders", json!({"a": 1})).await);
    }
}
