use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::database::models::Company;
use crate::database::{backup, bootstrap, DatabaseError};
use crate::services::registry::{self, Branding, NewCompany, RegistryError};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Invalid subdomain: {0}")]
    InvalidSubdomain(String),

    #[error("Operation requires a local-file database, got: {0}")]
    UnsupportedBackend(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub subdomain: String,
    /// Custom connection string; a local SQLite file under the companies
    /// directory is derived when absent.
    pub db_uri: Option<String>,
    pub branding: Branding,
}

/// Subdomains double as bind keys and database file names, so the charset
/// is strict: lowercase alphanumerics, hyphens, underscores.
pub fn validate_subdomain(subdomain: &str) -> Result<(), ProvisionError> {
    let valid_len = (2..=100).contains(&subdomain.len());
    let valid_chars = subdomain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    let valid_start = subdomain
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if valid_len && valid_chars && valid_start {
        Ok(())
    } else {
        Err(ProvisionError::InvalidSubdomain(subdomain.to_string()))
    }
}

/// Default per-company database location: one SQLite file per subdomain.
pub fn build_sqlite_uri(companies_dir: &Path, subdomain: &str) -> String {
    format!(
        "sqlite://{}",
        companies_dir.join(format!("{}.db", subdomain)).display()
    )
}

/// Register a company and provision its database: insert the master record,
/// open the tenant pool (creating the file for local backends), and create
/// the domain schema. A failure after registration is surfaced to the caller
/// and affects only this company.
pub async fn create_company(
    state: &AppState,
    request: CreateCompanyRequest,
) -> Result<Company, ProvisionError> {
    validate_subdomain(&request.subdomain)?;

    let db_uri = match request.db_uri {
        Some(uri) if !uri.trim().is_empty() => uri,
        _ => build_sqlite_uri(&state.config.storage.companies_dir, &request.subdomain),
    };

    let master = state.db.master_pool().await?;
    let company = registry::create(
        &master,
        NewCompany {
            name: request.name,
            subdomain: request.subdomain,
            db_uri,
            branding: request.branding,
        },
    )
    .await?;

    let pool = state
        .db
        .get_or_create(&company.subdomain, &company.db_uri)
        .await?;
    bootstrap::ensure_tenant_schema(&pool).await?;

    info!(subdomain = %company.subdomain, "company provisioned");
    Ok(company)
}

/// Online snapshot of a company database into the backups directory (or an
/// explicit target path). Local-file backends only.
pub async fn export_company(
    state: &AppState,
    subdomain: &str,
    out_path: Option<PathBuf>,
) -> Result<PathBuf, ProvisionError> {
    let master = state.db.master_pool().await?;
    let company = registry::find_by_subdomain(&master, subdomain)
        .await?
        .ok_or_else(|| RegistryError::NotFound(subdomain.to_string()))?;

    if backup::local_database_path(&company.db_uri).is_none() {
        return Err(ProvisionError::UnsupportedBackend(company.db_uri));
    }

    let out = out_path.unwrap_or_else(|| {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        state
            .config
            .storage
            .backups_dir
            .join(format!("{}_{}.db", company.subdomain, stamp))
    });

    let pool = state
        .db
        .get_or_create(&company.subdomain, &company.db_uri)
        .await?;
    backup::snapshot(&pool, &out).await?;

    info!(subdomain = %company.subdomain, out = %out.display(), "company exported");
    Ok(out)
}

/// Outcome of the physical half of a deletion.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum DatabaseRemoval {
    /// The backing file is gone (or never existed).
    Removed,
    /// The registry row is gone but the physical data still exists.
    Pending(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalReport {
    pub subdomain: String,
    pub registry_deleted: bool,
    pub database: DatabaseRemoval,
}

/// Hard-delete a company. Two distinct phases: the master record is removed
/// first, then the physical database. The phases are not atomic — a failed
/// or non-local second phase is reported as `Pending`, never papered over.
pub async fn delete_company(
    state: &AppState,
    subdomain: &str,
) -> Result<RemovalReport, ProvisionError> {
    let master = state.db.master_pool().await?;
    let company = registry::find_by_subdomain(&master, subdomain)
        .await?
        .ok_or_else(|| RegistryError::NotFound(subdomain.to_string()))?;

    registry::delete(&master, company.id).await?;
    state.db.evict(&company.subdomain).await;

    let database = match backup::local_database_path(&company.db_uri) {
        Some(path) => match std::fs::remove_file(&path) {
            Ok(()) => DatabaseRemoval::Removed,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DatabaseRemoval::Removed,
            Err(e) => DatabaseRemoval::Pending(format!("remove {}: {}", path.display(), e)),
        },
        None => DatabaseRemoval::Pending(format!(
            "non-local database '{}' must be removed out of band",
            company.db_uri
        )),
    };

    info!(subdomain = %company.subdomain, ?database, "company deleted");
    Ok(RemovalReport {
        subdomain: company.subdomain,
        registry_deleted: true,
        database,
    })
}
