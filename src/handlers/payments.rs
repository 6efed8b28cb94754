use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::warn;

use super::require_bookkeeper;
use crate::database::models::{Invoice, Payment};
use crate::error::ApiError;
use crate::middleware::{AuthUser, TenantPool};
use crate::services::ledger;

const PAYMENT_COLUMNS: &str =
    "id, contract_id, amount, due_date, paid_date, method, status, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    pub contract_id: i64,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub method: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkPaymentBody {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListFilter {
    pub status: Option<String>,
}

/// GET /api/payments?status=paid|unpaid
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let payments: Vec<Payment> = match filter.status.as_deref() {
        Some(status @ ("paid" | "unpaid")) => {
            sqlx::query_as(&format!(
                "SELECT {} FROM payments WHERE status = ?1 ORDER BY due_date ASC, id ASC",
                PAYMENT_COLUMNS
            ))
            .bind(status)
            .fetch_all(&pool)
            .await?
        }
        _ => {
            sqlx::query_as(&format!(
                "SELECT {} FROM payments ORDER BY due_date ASC, id ASC",
                PAYMENT_COLUMNS
            ))
            .fetch_all(&pool)
            .await?
        }
    };
    Ok(Json(json!({ "success": true, "data": payments })))
}

/// POST /api/payments - record a rent installment. A payment created in the
/// paid state posts its cash receipt immediately (best effort).
pub async fn create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    if body.amount <= 0.0 {
        return Err(ApiError::bad_request("Amount must be positive"));
    }
    let status = match body.status.as_deref() {
        None | Some("unpaid") => "unpaid",
        Some("paid") => "paid",
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "Invalid payment status: {}",
                other
            )))
        }
    };

    let contract: Option<(i64,)> = sqlx::query_as("SELECT id FROM contracts WHERE id = ?1")
        .bind(body.contract_id)
        .fetch_optional(&pool)
        .await?;
    if contract.is_none() {
        return Err(ApiError::not_found(format!(
            "Contract not found: {}",
            body.contract_id
        )));
    }

    let now = Utc::now();
    let paid_date = (status == "paid").then(|| now.date_naive());
    let result = sqlx::query(
        "INSERT INTO payments (contract_id, amount, due_date, paid_date, method, status, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
    )
    .bind(body.contract_id)
    .bind(body.amount)
    .bind(body.due_date)
    .bind(paid_date)
    .bind(&body.method)
    .bind(status)
    .bind(now)
    .execute(&pool)
    .await?;

    let payment = fetch_payment(&pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| ApiError::internal_server_error("Payment vanished after insert"))?;

    if payment.is_paid() {
        // Best effort: the payment stands even if bookkeeping fails; the
        // reconciliation sweep picks up anything missed here.
        if let Err(e) = ledger::post_cash_receipt(&pool, &payment).await {
            warn!(payment_id = payment.id, error = %e, "cash receipt posting failed");
        }
    }

    Ok(Json(json!({ "success": true, "data": payment })))
}

/// POST /api/payments/:id/mark - flip paid/unpaid and keep the books in
/// step: paid posts a cash receipt, unpaid posts the mirror-image reversal.
pub async fn mark(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<MarkPaymentBody>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    if body.status != "paid" && body.status != "unpaid" {
        return Err(ApiError::bad_request(format!(
            "Invalid payment status: {}",
            body.status
        )));
    }

    let payment = fetch_payment(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Payment not found: {}", id)))?;

    let now = Utc::now();
    let paid_date = if body.status == "paid" {
        Some(payment.paid_date.unwrap_or_else(|| now.date_naive()))
    } else {
        payment.paid_date
    };
    sqlx::query("UPDATE payments SET status = ?1, paid_date = ?2, updated_at = ?3 WHERE id = ?4")
        .bind(&body.status)
        .bind(paid_date)
        .bind(now)
        .bind(id)
        .execute(&pool)
        .await?;

    let payment = fetch_payment(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Payment not found: {}", id)))?;

    // Best effort either way; the business status change already stands
    let posting = if payment.is_paid() {
        ledger::post_cash_receipt(&pool, &payment).await
    } else {
        ledger::reverse_cash_receipt(&pool, &payment).await
    };
    if let Err(e) = posting {
        warn!(payment_id = payment.id, status = %payment.status, error = %e, "journal posting failed");
    }

    Ok(Json(json!({ "success": true, "data": payment })))
}

/// POST /api/payments/:id/invoice - create (or refresh) the invoice record
/// and recognize the receivable/revenue once.
pub async fn generate_invoice(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_bookkeeper(&user)?;
    let payment = fetch_payment(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Payment not found: {}", id)))?;

    let file_path = format!("invoices/invoice_{}.pdf", payment.id);
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO invoices (payment_id, file_path, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?3) \
         ON CONFLICT (payment_id) DO UPDATE SET file_path = excluded.file_path, updated_at = excluded.updated_at",
    )
    .bind(payment.id)
    .bind(&file_path)
    .bind(now)
    .execute(&pool)
    .await?;

    let invoice: Invoice = sqlx::query_as(
        "SELECT id, payment_id, file_path, created_at, updated_at FROM invoices WHERE payment_id = ?1",
    )
    .bind(payment.id)
    .fetch_one(&pool)
    .await?;

    if let Err(e) = ledger::post_invoice_revenue(&pool, &payment).await {
        warn!(payment_id = payment.id, error = %e, "invoice posting failed");
    }

    Ok(Json(json!({ "success": true, "data": invoice })))
}

async fn fetch_payment(pool: &SqlitePool, id: i64) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {} FROM payments WHERE id = ?1",
        PAYMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
