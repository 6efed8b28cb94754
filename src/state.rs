use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{bootstrap, DatabaseManager};

/// Shared application state: configuration plus the engine cache. Handlers
/// receive it via axum's `State` extractor; tests build isolated instances
/// against temporary directories.
pub struct AppState {
    pub config: AppConfig,
    pub db: DatabaseManager,
}

impl AppState {
    /// Open the master and global default databases, ensure their schemas,
    /// and return the shared state. The default pool captured here is the
    /// fallback target for every request that has no company bound.
    pub async fn initialize(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let db = DatabaseManager::new(config.database.max_connections);
        db.init(&config.database.master_url, &config.database.default_url)
            .await?;
        bootstrap::ensure_master_schema(&db.master_pool().await?).await?;
        bootstrap::ensure_tenant_schema(&db.default_pool().await?).await?;
        Ok(Arc::new(Self { config, db }))
    }
}
