use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

use super::require_superadmin;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::provisioning::{self, CreateCompanyRequest};
use crate::services::registry::{self, Branding, CompanyUpdate};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCompanyBody {
    pub name: String,
    pub subdomain: String,
    pub db_uri: Option<String>,
    pub logo_path: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub font_family: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCompanyBody {
    pub name: Option<String>,
    pub logo_path: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub font_family: Option<String>,
    pub is_active: Option<bool>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportBody {
    pub out_path: Option<String>,
}

/// GET /api/companies - full registry listing, archived included
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    require_superadmin(&user)?;
    let master = state.db.master_pool().await?;
    let companies = registry::list_all(&master).await?;
    Ok(Json(json!({ "success": true, "data": companies })))
}

/// POST /api/companies - register a company and provision its database
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateCompanyBody>,
) -> Result<Json<Value>, ApiError> {
    require_superadmin(&user)?;
    if body.name.trim().is_empty() || body.subdomain.trim().is_empty() {
        return Err(ApiError::bad_request("Name and subdomain are required"));
    }

    let defaults = Branding::default();
    let company = provisioning::create_company(
        &state,
        CreateCompanyRequest {
            name: body.name.trim().to_string(),
            subdomain: body.subdomain.trim().to_lowercase(),
            db_uri: body.db_uri,
            branding: Branding {
                logo_path: body.logo_path,
                primary_color: body.primary_color.unwrap_or(defaults.primary_color),
                secondary_color: body.secondary_color.unwrap_or(defaults.secondary_color),
                font_family: body.font_family.unwrap_or(defaults.font_family),
            },
        },
    )
    .await?;
    Ok(Json(json!({ "success": true, "data": company })))
}

/// PUT /api/companies/:id - edit registry fields and flags
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCompanyBody>,
) -> Result<Json<Value>, ApiError> {
    require_superadmin(&user)?;
    let master = state.db.master_pool().await?;
    let company = registry::update(
        &master,
        id,
        CompanyUpdate {
            name: body.name,
            logo_path: body.logo_path,
            primary_color: body.primary_color,
            secondary_color: body.secondary_color,
            font_family: body.font_family,
            is_active: body.is_active,
            is_archived: body.is_archived,
        },
    )
    .await?;
    Ok(Json(json!({ "success": true, "data": company })))
}

/// POST /api/companies/:id/archive - soft delete; database stays in place
pub async fn archive(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_superadmin(&user)?;
    let master = state.db.master_pool().await?;
    registry::archive(&master, id).await?;
    Ok(Json(json!({ "success": true, "data": { "archived": id } })))
}

/// DELETE /api/companies/:id - hard delete, two-phase. The response reports
/// whether the physical database is gone or still pending removal.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_superadmin(&user)?;
    let master = state.db.master_pool().await?;
    let company = registry::find_by_id(&master, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Company not found: {}", id)))?;
    let report = provisioning::delete_company(&state, &company.subdomain).await?;
    Ok(Json(json!({ "success": true, "data": report })))
}

/// POST /api/companies/:id/export - online snapshot of the company database
pub async fn export(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    body: Option<Json<ExportBody>>,
) -> Result<Json<Value>, ApiError> {
    require_superadmin(&user)?;
    let master = state.db.master_pool().await?;
    let company = registry::find_by_id(&master, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Company not found: {}", id)))?;

    let out_path = body
        .and_then(|Json(b)| b.out_path)
        .map(PathBuf::from);
    let path = provisioning::export_company(&state, &company.subdomain, out_path).await?;
    Ok(Json(json!({
        "success": true,
        "data": { "subdomain": company.subdomain, "path": path.display().to_string() }
    })))
}
