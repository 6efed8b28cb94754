use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::require_bookkeeper;
use crate::database::models::Expense;
use crate::error::ApiError;
use crate::middleware::{AuthUser, TenantPool};
use crate::services::ledger;

const EXPENSE_COLUMNS: &str =
    "id, description, amount, category, vendor, spent_at, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct CreateExpenseBody {
    pub description: String,
    pub amount: f64,
    pub category: Option<String>,
    pub vendor: Option<String>,
    pub spent_at: Option<NaiveDate>,
}

/// GET /api/expenses
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let expenses: Vec<Expense> = sqlx::query_as(&format!(
        "SELECT {} FROM expenses ORDER BY spent_at DESC, id DESC",
        EXPENSE_COLUMNS
    ))
    .fetch_all(&pool)
    .await?;
    Ok(Json(json!({ "success": true, "data": expenses })))
}

/// POST /api/expenses - record an expense and post it (best effort)
pub async fn create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateExpenseBody>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let description = body.description.trim();
    if description.is_empty() || body.amount <= 0.0 {
        return Err(ApiError::bad_request("Invalid expense data"));
    }

    let now = Utc::now();
    let spent_at = body.spent_at.unwrap_or_else(|| now.date_naive());
    let result = sqlx::query(
        "INSERT INTO expenses (description, amount, category, vendor, spent_at, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
    )
    .bind(description)
    .bind(body.amount)
    .bind(&body.category)
    .bind(&body.vendor)
    .bind(spent_at)
    .bind(now)
    .execute(&pool)
    .await?;

    let expense: Expense = sqlx::query_as(&format!(
        "SELECT {} FROM expenses WHERE id = ?1",
        EXPENSE_COLUMNS
    ))
    .bind(result.last_insert_rowid())
    .fetch_one(&pool)
    .await?;

    if let Err(e) = ledger::post_expense(&pool, &expense).await {
        warn!(expense_id = expense.id, error = %e, "expense posting failed");
    }

    Ok(Json(json!({ "success": true, "data": expense })))
}
