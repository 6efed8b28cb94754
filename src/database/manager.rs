use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Invalid bind key: {0}")]
    InvalidBindKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Reserved bind key for the master registry database (companies table).
pub const MASTER_BIND_KEY: &str = "__master__";

/// Reserved bind key for the global default database, captured at startup.
/// Requests with no bound company fall back to this pool.
pub const DEFAULT_BIND_KEY: &str = "__default__";

/// Connection pool registry for the master, default, and per-company databases.
///
/// Pools are opened lazily on first use of a bind key and cached for the
/// lifetime of the process. Apart from [`DatabaseManager::evict`] (used by
/// company deletion) nothing removes an entry; a long-running process keeps
/// one pool per company it has ever served.
///
/// There is deliberately no "currently active" slot here. The pool a request
/// operates on is resolved once per request by the tenant binder middleware
/// and carried through the request as an explicit value, so concurrent
/// requests for different companies never observe each other's binding.
pub struct DatabaseManager {
    max_connections: u32,
    pools: RwLock<HashMap<String, SqlitePool>>,
}

impl DatabaseManager {
    pub fn new(max_connections: u32) -> Self {
        Self {
            max_connections,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Open the master and global default pools and cache them under their
    /// reserved keys. Called once at startup, before any request is served.
    pub async fn init(&self, master_url: &str, default_url: &str) -> Result<(), DatabaseError> {
        self.get_or_create(MASTER_BIND_KEY, master_url).await?;
        self.get_or_create(DEFAULT_BIND_KEY, default_url).await?;
        Ok(())
    }

    /// Master registry database pool (companies table).
    pub async fn master_pool(&self) -> Result<SqlitePool, DatabaseError> {
        self.cached(MASTER_BIND_KEY)
            .await
            .ok_or(DatabaseError::ConfigMissing("master pool not initialized"))
    }

    /// Global default pool, the fallback when no company is bound.
    pub async fn default_pool(&self) -> Result<SqlitePool, DatabaseError> {
        self.cached(DEFAULT_BIND_KEY)
            .await
            .ok_or(DatabaseError::ConfigMissing("default pool not initialized"))
    }

    /// Get existing pool for `bind_key` or open one lazily from `conn_string`.
    ///
    /// Idempotent: repeated calls with the same key return the same cached
    /// pool. Two concurrent first calls for one key may both open a pool, but
    /// only one ends up cached; the loser is closed before being dropped.
    pub async fn get_or_create(
        &self,
        bind_key: &str,
        conn_string: &str,
    ) -> Result<SqlitePool, DatabaseError> {
        if !Self::is_valid_bind_key(bind_key) {
            return Err(DatabaseError::InvalidBindKey(bind_key.to_string()));
        }

        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(bind_key) {
                return Ok(pool.clone());
            }
        }

        let pool = self.open_pool(conn_string).await?;

        // Re-check under the write lock so concurrent discoveries of the same
        // key cannot cache two separate pools.
        let cached = {
            let mut pools = self.pools.write().await;
            match pools.get(bind_key) {
                Some(existing) => Some(existing.clone()),
                None => {
                    pools.insert(bind_key.to_string(), pool.clone());
                    None
                }
            }
        };

        if let Some(existing) = cached {
            pool.close().await;
            return Ok(existing);
        }

        info!(bind_key, "created database pool");
        Ok(pool)
    }

    async fn cached(&self, bind_key: &str) -> Option<SqlitePool> {
        self.pools.read().await.get(bind_key).cloned()
    }

    async fn open_pool(&self, conn_string: &str) -> Result<SqlitePool, DatabaseError> {
        // Ensure the parent directory exists for file-backed databases
        if let Some(db_path) = super::backup::local_database_path(conn_string) {
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        DatabaseError::InvalidDatabaseUrl(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(conn_string)
            .map_err(|_| DatabaseError::InvalidDatabaseUrl(conn_string.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?;

        Ok(pool)
    }

    /// Pings the master pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        let pool = self.master_pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Number of cached pools, reserved keys included.
    pub async fn pool_count(&self) -> usize {
        self.pools.read().await.len()
    }

    /// Close and drop a cached pool. Only company deletion uses this; there
    /// is no general-purpose eviction.
    pub async fn evict(&self, bind_key: &str) {
        let removed = {
            let mut pools = self.pools.write().await;
            pools.remove(bind_key)
        };
        if let Some(pool) = removed {
            pool.close().await;
            info!(bind_key, "closed database pool");
        }
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!(bind_key = %name, "closed database pool");
        }
    }

    /// Validate bind keys. Accepts the two reserved keys, or a company
    /// subdomain: lowercase alphanumerics, hyphens, and underscores.
    fn is_valid_bind_key(name: &str) -> bool {
        if name == MASTER_BIND_KEY || name == DEFAULT_BIND_KEY {
            return true;
        }
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    }
}
