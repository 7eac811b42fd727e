use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Which authorization-context shape the deployment trusts.
///
/// `Permissions`: bypass via a permission string, tenant from a request header.
/// `Role`: bypass via an exact role match, tenant from the authenticated claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationModeKind {
    Permissions,
    Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub mode: AuthorizationModeKind,
    pub bypass_permission: String,
    pub privileged_role: String,
    pub tenant_header: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: AuthorizationModeKind::Permissions,
            bypass_permission: "read:all_subdomains".to_string(),
            privileged_role: "admin".to_string(),
            tenant_header: "X-Client-Subdomain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    /// Overrides the database named in `database_url`
    pub database_name: Option<String>,
    pub documents_table: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub query_timeout_ms: u64,
    pub max_limit: Option<u32>,
    pub enable_query_logging: bool,
    pub slow_query_threshold_ms: u64,
    /// YAML or JSON file of `collection -> [documents]` loaded into the memory backend
    pub seed_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        AppConfig::development().store
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        AppConfig::development().api
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        AppConfig::development().security
    }
}

impl AppConfig {
    /// Build the effective configuration.
    ///
    /// Order: environment preset (`APP_ENV`), then the YAML file named by
    /// `QUERYGATE_CONFIG` if set, then individual environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var("QUERYGATE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::for_environment(Self::environment_from_env()),
        };
        base.with_env_overrides()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    fn environment_from_env() -> Environment {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        // Policy overrides
        if let Ok(v) = env::var("POLICY_AUTH_MODE") {
            self.policy.mode = match v.trim().to_ascii_lowercase().as_str() {
                "permissions" => AuthorizationModeKind::Permissions,
                "role" => AuthorizationModeKind::Role,
                _ => return Err(ConfigError::InvalidValue { key: "POLICY_AUTH_MODE", value: v }),
            };
        }
        if let Ok(v) = env::var("POLICY_BYPASS_PERMISSION") {
            self.policy.bypass_permission = v;
        }
        if let Ok(v) = env::var("POLICY_PRIVILEGED_ROLE") {
            self.policy.privileged_role = v;
        }
        if let Ok(v) = env::var("POLICY_TENANT_HEADER") {
            self.policy.tenant_header = v;
        }

        // Store overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.store.backend = match v.trim().to_ascii_lowercase().as_str() {
                "postgres" | "postgresql" => StoreBackend::Postgres,
                "memory" => StoreBackend::Memory,
                _ => return Err(ConfigError::InvalidValue { key: "STORE_BACKEND", value: v }),
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("STORE_DATABASE_NAME") {
            self.store.database_name = Some(v);
        }
        if let Ok(v) = env::var("STORE_DOCUMENTS_TABLE") {
            self.store.documents_table = v;
        }
        if let Ok(v) = env::var("STORE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("STORE_CONNECTION_TIMEOUT") {
            self.store.connection_timeout = v.parse().unwrap_or(self.store.connection_timeout);
        }
        if let Ok(v) = env::var("STORE_QUERY_TIMEOUT_MS") {
            self.store.query_timeout_ms = v.parse().unwrap_or(self.store.query_timeout_ms);
        }
        if let Ok(v) = env::var("STORE_MAX_LIMIT") {
            self.store.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("STORE_ENABLE_QUERY_LOGGING") {
            self.store.enable_query_logging = v.parse().unwrap_or(self.store.enable_query_logging);
        }
        if let Ok(v) = env::var("STORE_SLOW_QUERY_THRESHOLD_MS") {
            self.store.slow_query_threshold_ms = v.parse().unwrap_or(self.store.slow_query_threshold_ms);
        }
        if let Ok(v) = env::var("STORE_SEED_PATH") {
            self.store.seed_path = Some(PathBuf::from(v));
        }

        // API overrides
        if let Some(v) = env::var("QUERYGATE_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }

        Ok(self)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            policy: PolicyConfig::default(),
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                database_name: None,
                documents_table: "documents".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                query_timeout_ms: 10_000,
                max_limit: Some(1000),
                enable_query_logging: true,
                slow_query_threshold_ms: 100,
                seed_path: None,
            },
            api: ApiConfig {
                port: 8082,
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                jwt_secret: "development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                enable_audit_logging: false,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            policy: PolicyConfig::default(),
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                database_name: None,
                documents_table: "documents".to_string(),
                max_connections: 20,
                connection_timeout: 10,
                query_timeout_ms: 5_000,
                max_limit: Some(500),
                enable_query_logging: true,
                slow_query_threshold_ms: 500,
                seed_path: None,
            },
            api: ApiConfig {
                port: 8082,
                enable_request_logging: true,
                max_request_size_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                enable_audit_logging: true,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            policy: PolicyConfig::default(),
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                database_name: None,
                documents_table: "documents".to_string(),
                max_connections: 50,
                connection_timeout: 5,
                query_timeout_ms: 3_000,
                max_limit: Some(100),
                enable_query_logging: false,
                slow_query_threshold_ms: 1000,
                seed_path: None,
            },
            api: ApiConfig {
                port: 8082,
                enable_request_logging: false,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                enable_audit_logging: true,
            },
        }
    }
}
