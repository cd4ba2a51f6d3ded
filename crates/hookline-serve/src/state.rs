//! Application state and configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use hookline_core::DEFAULT_RETENTION_LIMIT;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Path to the SQLite database, or ":memory:".
    pub db_path: String,

    /// Shared secret for the platform webhook source (HMAC-SHA256).
    pub platform_secret: String,

    /// Shared secret for the analytics webhook source (HMAC-SHA1).
    pub analytics_secret: String,

    /// Valid API tokens for the inspection endpoints.
    pub api_tokens: HashSet<String>,

    /// Number of most-recent events to retain.
    pub retention_limit: u32,

    /// Known-bad identifier values that never alert, loaded at startup.
    pub excluded_ids: HashSet<String>,

    /// Port for the Prometheus /metrics endpoint (optional).
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `HOOKLINE_PLATFORM_SECRET`: shared secret for the platform source
    /// - `HOOKLINE_ANALYTICS_SECRET`: shared secret for the analytics source
    /// - `HOOKLINE_API_TOKENS`: comma-separated list of valid API tokens
    ///
    /// Optional environment variables:
    /// - `HOOKLINE_BIND_ADDR`: server bind address (default: "0.0.0.0:8080")
    /// - `HOOKLINE_DB_PATH`: SQLite database path (default: "./hookline.db")
    /// - `HOOKLINE_RETENTION_LIMIT`: events to retain (default: 100)
    /// - `HOOKLINE_EXCLUSION_LIST`: path to a newline-delimited file of
    ///   known-bad identifier values
    /// - `HOOKLINE_METRICS_PORT`: port for the Prometheus exporter
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("HOOKLINE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let db_path =
            std::env::var("HOOKLINE_DB_PATH").unwrap_or_else(|_| "./hookline.db".to_string());

        let platform_secret = std::env::var("HOOKLINE_PLATFORM_SECRET")
            .map_err(|_| anyhow::anyhow!("HOOKLINE_PLATFORM_SECRET environment variable is required"))?;

        let analytics_secret = std::env::var("HOOKLINE_ANALYTICS_SECRET")
            .map_err(|_| anyhow::anyhow!("HOOKLINE_ANALYTICS_SECRET environment variable is required"))?;

        let tokens_str = std::env::var("HOOKLINE_API_TOKENS")
            .map_err(|_| anyhow::anyhow!("HOOKLINE_API_TOKENS environment variable is required"))?;

        let api_tokens: HashSet<String> = tokens_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if api_tokens.is_empty() {
            anyhow::bail!("HOOKLINE_API_TOKENS must contain at least one token");
        }

        let retention_limit = match std::env::var("HOOKLINE_RETENTION_LIMIT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("HOOKLINE_RETENTION_LIMIT must be an integer"))?,
            Err(_) => DEFAULT_RETENTION_LIMIT,
        };

        let excluded_ids = match std::env::var("HOOKLINE_EXCLUSION_LIST").ok().map(PathBuf::from) {
            Some(path) => hookline_core::load_exclusion_list(&path)?,
            None => HashSet::new(),
        };

        let metrics_port = std::env::var("HOOKLINE_METRICS_PORT")
            .ok()
            .map(|raw| {
                raw.parse()
                    .map_err(|_| anyhow::anyhow!("HOOKLINE_METRICS_PORT must be a port number"))
            })
            .transpose()?;

        tracing::info!(
            bind_addr = %bind_addr,
            db_path = %db_path,
            token_count = api_tokens.len(),
            retention_limit,
            excluded_ids = excluded_ids.len(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            db_path,
            platform_secret,
            analytics_secret,
            api_tokens,
            retention_limit,
            excluded_ids,
            metrics_port,
        })
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection shared by the event store and alias registry.
    pub db: Arc<Mutex<Connection>>,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new application state: opens the database and ensures the
    /// schema exists.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let conn = Connection::open(&config.db_path)?;
        crate::store::init_schema(&conn)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
        })
    }

    /// Event store view over the shared connection.
    pub fn events(&self) -> crate::store::EventStore {
        crate::store::EventStore::new(Arc::clone(&self.db))
    }

    /// Alias registry view over the shared connection.
    pub fn aliases(&self) -> crate::store::AliasRegistry {
        crate::store::AliasRegistry::new(Arc::clone(&self.db))
    }
}
