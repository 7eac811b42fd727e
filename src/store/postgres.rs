use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::{postgres::PgArguments, postgres::PgPoolOptions, PgPool, Row};
use tokio::time::timeout;
use tracing::info;

use super::sql::{quote_identifier, DocumentSelect, SqlParam};
use super::{effective_limit, Document, DocumentStore, StoreError};
use crate::config::StoreConfig;
use crate::policy::SecureQuery;

/// Documents stored as JSONB rows of a single `(collection, id, data)` table
pub struct PostgresStore {
    pool: PgPool,
    table: String,
    query_timeout: Duration,
    max_limit: Option<u32>,
    enable_query_logging: bool,
    slow_query_threshold: Duration,
}

impl PostgresStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let connection_string = Self::build_connection_string(config)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&connection_string)
            .await?;

        info!("Created database pool for documents table '{}'", config.documents_table);
        Ok(Self::with_pool(pool, config))
    }

    pub fn with_pool(pool: PgPool, config: &StoreConfig) -> Self {
        Self {
            pool,
            table: config.documents_table.clone(),
            query_timeout: Duration::from_millis(config.query_timeout_ms),
            max_limit: config.max_limit,
            enable_query_logging: config.enable_query_logging,
            slow_query_threshold: Duration::from_millis(config.slow_query_threshold_ms),
        }
    }

    /// `DATABASE_URL`, with its path swapped for `database_name` when set
    fn build_connection_string(config: &StoreConfig) -> Result<String, StoreError> {
        let base = config
            .database_url
            .as_deref()
            .ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;

        let mut url = url::Url::parse(base).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        if let Some(name) = config.database_name.as_deref() {
            url.set_path(&format!("/{}", name));
        }
        Ok(url.into())
    }

    /// Create the documents table and its JSONB index if missing
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let table = quote_identifier(&self.table);
        let index = quote_identifier(&format!("{}_data_idx", self.table));
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\"collection\" TEXT NOT NULL, \"id\" TEXT NOT NULL, \"data\" JSONB NOT NULL, PRIMARY KEY (\"collection\", \"id\"))",
            table
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!("CREATE INDEX IF NOT EXISTS {} ON {} USING GIN (\"data\")", index, table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn fetch(&self, collection: &str, query: &SecureQuery) -> Result<Vec<Document>, StoreError> {
        let options = query.options();
        let limit = effective_limit(options.limit, self.max_limit);
        let sql_result = DocumentSelect::generate(&self.table, collection, options, limit)?;

        if self.enable_query_logging {
            tracing::debug!("SQL: {} ({} params)", sql_result.query, sql_result.params.len());
        }

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }

        let started = Instant::now();
        let rows = timeout(self.query_timeout, async {
            q.fetch(&self.pool)
                .map_err(StoreError::from)
                .and_then(|row| async move {
                    let data: Value = row.try_get("data")?;
                    Ok::<_, StoreError>(data)
                })
                .try_collect::<Vec<Value>>()
                .await
        })
        .await
        .map_err(|_| StoreError::Timeout(self.query_timeout.as_millis() as u64))??;

        let elapsed = started.elapsed();
        if elapsed > self.slow_query_threshold {
            tracing::warn!("Slow query on '{}': {:?}", collection, elapsed);
        }

        let documents = rows
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(map) => Some(map),
                other => {
                    tracing::warn!("Skipping non-object document in '{}': {}", collection, other);
                    None
                }
            })
            .collect();
        Ok(documents)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    p: &'q SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match p {
        SqlParam::Text(s) => q.bind(s.as_str()),
        SqlParam::Json(v) => q.bind(v.clone()), // JSONB
        SqlParam::Int(i) => q.bind(*i),
    }
}
