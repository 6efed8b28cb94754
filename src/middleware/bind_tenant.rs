use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

use super::auth::AuthUser;
use crate::database::models::Company;
use crate::database::{bootstrap, DatabaseError};
use crate::error::ApiError;
use crate::services::registry;
use crate::state::AppState;

/// The database pool every data access in this request must target,
/// injected by the tenant binder. Carrying the handle as a request-scoped
/// value — rather than swapping a process-wide "active" slot — is what
/// keeps concurrent requests for different companies from reading each
/// other's binding.
#[derive(Clone)]
pub struct TenantPool(pub SqlitePool);

/// Which database the binder settled on.
#[derive(Clone, Debug)]
pub enum TenantSelection {
    /// A valid, active company: the request runs against its database.
    Company(Company),
    /// No company bound (or the bound one was invalid): the request runs
    /// against the global default database.
    Default,
}

pub struct ResolvedTenant {
    pub selection: TenantSelection,
    pub pool: SqlitePool,
}

/// Resolve the caller's company id to a database pool.
///
/// Resolution never fails the request over a bad tenant: an unknown,
/// inactive, or archived company — or a tenant database that cannot be
/// opened — degrades to the global default pool. The only error surfaced is
/// an unusable default pool, which means the process never initialized.
pub async fn resolve_tenant(
    state: &AppState,
    company_id: Option<i64>,
) -> Result<ResolvedTenant, DatabaseError> {
    let Some(id) = company_id else {
        return default_binding(state).await;
    };

    let master = state.db.master_pool().await?;
    let company = match registry::find_by_id(&master, id).await {
        Ok(Some(c)) if c.is_active && !c.is_archived => c,
        Ok(_) => {
            debug!(company_id = id, "company missing, inactive, or archived; using default database");
            return default_binding(state).await;
        }
        Err(e) => {
            warn!(company_id = id, error = %e, "company lookup failed; using default database");
            return default_binding(state).await;
        }
    };

    let pool = match state
        .db
        .get_or_create(&company.subdomain, &company.db_uri)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            warn!(subdomain = %company.subdomain, error = %e, "tenant database unavailable; using default database");
            return default_binding(state).await;
        }
    };

    // First-run convenience: create the schema if the marker table is
    // missing. A failure here is logged and the request proceeds on the
    // tenant pool; downstream queries will fail normally.
    match bootstrap::has_table(&pool, bootstrap::MARKER_TABLE).await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = bootstrap::ensure_tenant_schema(&pool).await {
                warn!(subdomain = %company.subdomain, error = %e, "tenant schema bootstrap failed");
            }
        }
        Err(e) => {
            warn!(subdomain = %company.subdomain, error = %e, "tenant schema probe failed");
        }
    }

    Ok(ResolvedTenant {
        selection: TenantSelection::Company(company),
        pool,
    })
}

async fn default_binding(state: &AppState) -> Result<ResolvedTenant, DatabaseError> {
    Ok(ResolvedTenant {
        selection: TenantSelection::Default,
        pool: state.db.default_pool().await?,
    })
}

/// Middleware that binds the request to its company database before any
/// data access. Runs after JWT auth; requests with no (or an unusable)
/// company binding fall back to the global default database.
pub async fn bind_tenant_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let company_id = request
        .extensions()
        .get::<AuthUser>()
        .and_then(|user| user.company_id);

    let resolved = resolve_tenant(&state, company_id).await.map_err(|e| {
        tracing::error!(error = %e, "no usable database for request");
        ApiError::service_unavailable("Database temporarily unavailable")
    })?;

    request.extensions_mut().insert(TenantPool(resolved.pool));
    request.extensions_mut().insert(resolved.selection);
    Ok(next.run(request).await)
}
