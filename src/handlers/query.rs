use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::PolicyCompliant;
use crate::policy::SecureQuery;
use crate::store::{self, Document};

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub documents: Vec<Document>,
    pub count: usize,
    pub collection: String,
    pub query: SecureQuery,
}

/// POST /:collection - run a policy-compliant query against the store
pub async fn query_post(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    PolicyCompliant(query): PolicyCompliant,
) -> Result<Json<QueryResponse>, ApiError> {
    store::validate_collection(&collection)?;

    let documents = state.store.fetch(&collection, &query).await?;
    tracing::info!(
        collection = %collection,
        filters = query.filters().len(),
        count = documents.len(),
        "query executed"
    );

    Ok(Json(QueryResponse {
        success: true,
        count: documents.len(),
        documents,
        collection,
        query,
    }))
}
