use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::ledger::{self, LedgerError, PostingOutcome};
use crate::database::models::{Expense, Payment};

/// Counts of entries re-posted by one sweep.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileReport {
    pub cash_receipts_posted: u32,
    pub reversals_posted: u32,
    pub invoices_posted: u32,
    pub expenses_posted: u32,
}

impl ReconcileReport {
    pub fn total(&self) -> u32 {
        self.cash_receipts_posted
            + self.reversals_posted
            + self.invoices_posted
            + self.expenses_posted
    }
}

const PAYMENT_COLUMNS: &str =
    "id, contract_id, amount, due_date, paid_date, method, status, created_at, updated_at";

/// Close the gap the best-effort posting policy leaves open: business
/// records whose journal entry never landed are found and posted now.
/// Idempotent — a clean book yields an all-zero report.
pub async fn reconcile_books(pool: &SqlitePool) -> Result<ReconcileReport, LedgerError> {
    let mut report = ReconcileReport::default();

    // Paid payments with no cash receipt entry
    let payments: Vec<Payment> = sqlx::query_as(&format!(
        "SELECT {} FROM payments p \
         WHERE p.status = 'paid' AND NOT EXISTS \
             (SELECT 1 FROM journal_entries e \
              WHERE e.source = 'payment' AND e.source_id = p.id) \
         ORDER BY p.id ASC",
        PAYMENT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    for payment in &payments {
        if let PostingOutcome::Posted { .. } = ledger::post_cash_receipt(pool, payment).await? {
            report.cash_receipts_posted += 1;
        }
    }

    // Payments back to unpaid whose receipt was never reversed
    let unpaid: Vec<Payment> = sqlx::query_as(&format!(
        "SELECT {} FROM payments p \
         WHERE p.status = 'unpaid' \
           AND EXISTS (SELECT 1 FROM journal_entries e \
                       WHERE e.source = 'payment' AND e.source_id = p.id) \
           AND NOT EXISTS (SELECT 1 FROM journal_entries e \
                           WHERE e.source = 'payment_reverse' AND e.source_id = p.id) \
         ORDER BY p.id ASC",
        PAYMENT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    for payment in &unpaid {
        if let PostingOutcome::Posted { .. } = ledger::reverse_cash_receipt(pool, payment).await? {
            report.reversals_posted += 1;
        }
    }

    // Invoices with no revenue recognition entry
    let invoiced: Vec<Payment> = sqlx::query_as(
        "SELECT p.id, p.contract_id, p.amount, p.due_date, p.paid_date, p.method, p.status, \
                p.created_at, p.updated_at \
         FROM payments p \
         JOIN invoices i ON i.payment_id = p.id \
         WHERE NOT EXISTS (SELECT 1 FROM journal_entries e \
                           WHERE e.source = 'invoice' AND e.source_id = p.id) \
         ORDER BY p.id ASC",
    )
    .fetch_all(pool)
    .await?;
    for payment in &invoiced {
        if let PostingOutcome::Posted { .. } = ledger::post_invoice_revenue(pool, payment).await? {
            report.invoices_posted += 1;
        }
    }

    // Expenses with no expense entry
    let expenses: Vec<Expense> = sqlx::query_as(
        "SELECT id, description, amount, category, vendor, spent_at, created_at, updated_at \
         FROM expenses x \
         WHERE NOT EXISTS (SELECT 1 FROM journal_entries e \
                           WHERE e.source = 'expense' AND e.source_id = x.id) \
         ORDER BY x.id ASC",
    )
    .fetch_all(pool)
    .await?;
    for expense in &expenses {
        if let PostingOutcome::Posted { .. } = ledger::post_expense(pool, expense).await? {
            report.expenses_posted += 1;
        }
    }

    if report.total() > 0 {
        info!(
            cash_receipts = report.cash_receipts_posted,
            reversals = report.reversals_posted,
            invoices = report.invoices_posted,
            expenses = report.expenses_posted,
            "reconciliation posted missing journal entries"
        );
    }
    Ok(report)
}
