use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::require_bookkeeper;
use crate::database::models::AccountType;
use crate::error::ApiError;
use crate::middleware::{AuthUser, TenantPool};
use crate::services::{ledger, reconcile};

#[derive(Debug, Deserialize)]
pub struct CreateAccountBody {
    pub code: String,
    pub name: String,
    pub kind: String,
}

/// GET /api/accounts - chart of accounts ordered by kind then code
pub async fn list_accounts(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let accounts = ledger::list_accounts(&pool).await?;
    Ok(Json(json!({ "success": true, "data": accounts })))
}

/// POST /api/accounts - manual account creation
pub async fn create_account(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateAccountBody>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let code = body.code.trim();
    let name = body.name.trim();
    if code.is_empty() || name.is_empty() {
        return Err(ApiError::bad_request("Code and name are required"));
    }
    let kind: AccountType = body
        .kind
        .parse()
        .map_err(|e: String| ApiError::bad_request(e))?;

    if ledger::find_account_by_code(&pool, code).await?.is_some() {
        return Err(ApiError::conflict(format!(
            "Account code already exists: {}",
            code
        )));
    }
    let account = ledger::get_or_create_account(&pool, code, name, kind).await?;
    Ok(Json(json!({ "success": true, "data": account })))
}

/// GET /api/reports/ledger/:account_id - per-account running balance
pub async fn account_ledger(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
    Path(account_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let rows = ledger::account_ledger(&pool, account_id).await?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

/// GET /api/reports/trial-balance
pub async fn trial_balance(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let report = ledger::trial_balance(&pool).await?;
    Ok(Json(json!({ "success": true, "data": report })))
}

/// GET /api/reports/income-statement
pub async fn income_statement(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let report = ledger::income_statement(&pool).await?;
    Ok(Json(json!({ "success": true, "data": report })))
}

/// GET /api/reports/balance-sheet
pub async fn balance_sheet(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let report = ledger::balance_sheet(&pool).await?;
    Ok(Json(json!({ "success": true, "data": report })))
}

/// POST /api/reports/reconcile - re-post any business record whose journal
/// entry is missing (the best-effort posting policy's safety net)
pub async fn reconcile(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let report = reconcile::reconcile_books(&pool).await?;
    Ok(Json(json!({ "success": true, "data": report })))
}
