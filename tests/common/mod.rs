#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::json;
use tokio::task::JoinHandle;

use querygate::app::{self, AppState};
use querygate::auth::{generate_jwt, Claims};
use querygate::config::{AppConfig, AuthorizationModeKind};
use querygate::store::MemoryStore;

pub const SECRET: &str = "integration-secret";
pub const BYPASS: &str = "read:all_subdomains";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: MemoryStore,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl TestServer {
    /// Serve the gateway in-process on an unused port, backed by seeded memory documents
    pub async fn spawn(mode: AuthorizationModeKind) -> Result<Self> {
        let mut config = AppConfig::development();
        config.policy.mode = mode;
        config.security.jwt_secret = SECRET.to_string();
        config.api.max_request_size_bytes = 16 * 1024;

        let store = MemoryStore::new(config.store.max_limit);
        seed(&store).await;

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;

        let app = app::router(AppState::new(config, Arc::new(store.clone())));
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self { port, base_url, store, handle };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }
}

pub fn token(claims: Claims) -> String {
    generate_jwt(&claims, SECRET).expect("token")
}

pub fn member_token() -> String {
    token(Claims::new("alice", "member", 1))
}

pub fn bypass_token() -> String {
    token(Claims::new("ops", "support", 1).with_permissions([BYPASS.to_string()]))
}

async fn seed(store: &MemoryStore) {
    let documents = [
        json!({"id": "o1", "project_id": "p1", "subdomain": "acme", "total": 120, "tags": ["priority"]}),
        json!({"id": "o2", "project_id": "p1", "subdomain": "acme", "total": 40, "tags": []}),
        json!({"id": "o3", "project_id": "p1", "subdomain": "globex", "total": 75, "tags": ["priority"]}),
        json!({"id": "o4", "project_id": "p2", "subdomain": "acme", "total": 10, "tags": []}),
    ];
    for document in documents {
        store.insert_value("orders", document).await;
    }
}
