use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Master registry database (companies table).
    pub master_url: String,
    /// Global default tenant database, used when no company is bound.
    /// The super-admin account lives here.
    pub default_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory where per-company SQLite databases are created.
    pub companies_dir: PathBuf,
    /// Directory where snapshot exports are written.
    pub backups_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("RENTORA_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("RENTORA_MASTER_DATABASE_URL") {
            self.database.master_url = v;
        }
        if let Ok(v) = env::var("RENTORA_DATABASE_URL") {
            self.database.default_url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("RENTORA_COMPANY_DB_DIR") {
            self.storage.companies_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("RENTORA_BACKUP_DIR") {
            self.storage.backups_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                master_url: "sqlite://data/master.db".to_string(),
                default_url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            storage: StorageConfig {
                companies_dir: PathBuf::from("data/companies"),
                backups_dir: PathBuf::from("data/backups"),
            },
            security: SecurityConfig {
                jwt_secret: "dev-jwt-secret".to_string(),
                jwt_expiry_hours: 24 * 7,
                bcrypt_cost: 4,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                master_url: "sqlite://data/master.db".to_string(),
                default_url: "sqlite://data/app.db".to_string(),
                max_connections: 10,
            },
            storage: StorageConfig {
                companies_dir: PathBuf::from("data/companies"),
                backups_dir: PathBuf::from("data/backups"),
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 12,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                master_url: "sqlite://data/master.db".to_string(),
                default_url: "sqlite://data/app.db".to_string(),
                max_connections: 20,
            },
            storage: StorageConfig {
                companies_dir: PathBuf::from("data/companies"),
                backups_dir: PathBuf::from("data/backups"),
            },
            security: SecurityConfig {
                // Must be provided via JWT_SECRET in production
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                bcrypt_cost: 12,
            },
        }
    }
}

// Global singleton config - initialized once at startup. Tests build their
// own AppConfig instances instead of touching this.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.database.master_url, "sqlite://data/master.db");
        assert_eq!(config.security.bcrypt_cost, 4);
        assert_eq!(config.security.jwt_expiry_hours, 24 * 7);
    }

    #[test]
    fn production_requires_secret_from_env() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.security.bcrypt_cost, 12);
    }
}
