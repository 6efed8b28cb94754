mod common;

use anyhow::Result;
use axum::extract::Path;
use axum::{Extension, Json};
use chrono::NaiveDate;
use sqlx::SqlitePool;

use rentora_api::handlers::payments::{self, MarkPaymentBody};
use rentora_api::middleware::{AuthUser, TenantPool};
use rentora_api::services::ledger::{self, PostingOutcome};
use rentora_api::services::reconcile;

fn accountant() -> AuthUser {
    AuthUser {
        user_id: 1,
        username: "books".to_string(),
        role: "accountant".to_string(),
        company_id: Some(1),
    }
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

async fn entry_count(pool: &SqlitePool, source: &str, source_id: i64) -> i64 {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM journal_entries WHERE source = ?1 AND source_id = ?2",
    )
    .bind(source)
    .bind(source_id)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

async fn account_balance(pool: &SqlitePool, code: &str) -> f64 {
    let report = ledger::trial_balance(pool).await.unwrap();
    report
        .rows
        .iter()
        .find(|r| r.code == code)
        .map(|r| r.balance)
        .unwrap_or(0.0)
}

#[tokio::test]
async fn cash_receipt_posting_is_idempotent() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;
    let payment =
        common::create_payment(&pool, contract_id, 500.0, date("2025-01-01"), "paid").await?;

    let first = ledger::post_cash_receipt(&pool, &payment).await?;
    assert!(matches!(first, PostingOutcome::Posted { .. }));

    let second = ledger::post_cash_receipt(&pool, &payment).await?;
    assert_eq!(second, PostingOutcome::AlreadyPosted);

    assert_eq!(entry_count(&pool, "payment", payment.id).await, 1);
    Ok(())
}

#[tokio::test]
async fn every_posted_entry_balances() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;

    let paid =
        common::create_payment(&pool, contract_id, 750.25, date("2025-02-01"), "paid").await?;
    ledger::post_cash_receipt(&pool, &paid).await?;
    ledger::post_invoice_revenue(&pool, &paid).await?;

    let mut unpaid = paid.clone();
    unpaid.status = "unpaid".to_string();
    ledger::reverse_cash_receipt(&pool, &unpaid).await?;

    let expense = sqlx::query(
        "INSERT INTO expenses (description, amount, category, vendor, spent_at, created_at, updated_at) \
         VALUES ('Repairs', 120.5, NULL, NULL, '2025-02-03', '2025-02-03T00:00:00Z', '2025-02-03T00:00:00Z')",
    )
    .execute(&pool)
    .await?;
    let expense = sqlx::query_as::<_, rentora_api::database::models::Expense>(
        "SELECT id, description, amount, category, vendor, spent_at, created_at, updated_at \
         FROM expenses WHERE id = ?1",
    )
    .bind(expense.last_insert_rowid())
    .fetch_one(&pool)
    .await?;
    ledger::post_expense(&pool, &expense).await?;

    let per_entry: Vec<(i64, f64, f64)> = sqlx::query_as(
        "SELECT entry_id, COALESCE(SUM(debit), 0.0), COALESCE(SUM(credit), 0.0) \
         FROM journal_lines GROUP BY entry_id",
    )
    .fetch_all(&pool)
    .await?;
    assert_eq!(per_entry.len(), 4);
    for (entry_id, debits, credits) in per_entry {
        assert!(
            (debits - credits).abs() < 1e-9,
            "entry {} unbalanced: {} vs {}",
            entry_id,
            debits,
            credits
        );
    }
    Ok(())
}

#[tokio::test]
async fn reversal_restores_cash_and_receivable() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;
    let payment =
        common::create_payment(&pool, contract_id, 640.0, date("2025-03-01"), "paid").await?;

    ledger::post_cash_receipt(&pool, &payment).await?;
    assert_eq!(account_balance(&pool, "1000").await, 640.0);
    assert_eq!(account_balance(&pool, "1100").await, -640.0);

    let outcome = ledger::reverse_cash_receipt(&pool, &payment).await?;
    assert!(matches!(outcome, PostingOutcome::Posted { .. }));
    assert_eq!(account_balance(&pool, "1000").await, 0.0);
    assert_eq!(account_balance(&pool, "1100").await, 0.0);

    // Reversal is itself idempotent
    let again = ledger::reverse_cash_receipt(&pool, &payment).await?;
    assert_eq!(again, PostingOutcome::AlreadyPosted);
    Ok(())
}

#[tokio::test]
async fn reversal_without_receipt_is_a_noop() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;
    let payment =
        common::create_payment(&pool, contract_id, 100.0, date("2025-03-01"), "unpaid").await?;

    let outcome = ledger::reverse_cash_receipt(&pool, &payment).await?;
    assert_eq!(outcome, PostingOutcome::MissingSource);
    assert_eq!(entry_count(&pool, "payment_reverse", payment.id).await, 0);
    Ok(())
}

#[tokio::test]
async fn trial_balance_debits_equal_credits() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;

    for (amount, day) in [(500.0, "2025-01-01"), (725.5, "2025-01-15"), (90.25, "2025-02-01")] {
        let payment = common::create_payment(&pool, contract_id, amount, date(day), "paid").await?;
        ledger::post_invoice_revenue(&pool, &payment).await?;
        ledger::post_cash_receipt(&pool, &payment).await?;
    }

    let report = ledger::trial_balance(&pool).await?;
    assert!(
        (report.total_debits - report.total_credits).abs() < 1e-9,
        "trial balance out of balance: {} vs {}",
        report.total_debits,
        report.total_credits
    );
    assert!(report.total_debits > 0.0);
    Ok(())
}

#[tokio::test]
async fn paid_unpaid_cycle_through_handlers_matches_spec_example() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;
    let payment =
        common::create_payment(&pool, contract_id, 500.0, date("2025-01-01"), "unpaid").await?;

    // Mark paid: one entry, debit Cash 500 / credit Accounts Receivable 500
    payments::mark(
        Extension(TenantPool(pool.clone())),
        Extension(accountant()),
        Path(payment.id),
        Json(MarkPaymentBody {
            status: "paid".to_string(),
        }),
    )
    .await
    .expect("mark paid");

    assert_eq!(entry_count(&pool, "payment", payment.id).await, 1);
    let (memo,): (String,) = sqlx::query_as(
        "SELECT memo FROM journal_entries WHERE source = 'payment' AND source_id = ?1",
    )
    .bind(payment.id)
    .fetch_one(&pool)
    .await?;
    assert!(memo.contains(&payment.id.to_string()));

    let lines: Vec<(f64, f64)> = sqlx::query_as(
        "SELECT l.debit, l.credit FROM journal_lines l \
         JOIN journal_entries e ON e.id = l.entry_id \
         WHERE e.source = 'payment' AND e.source_id = ?1 \
         ORDER BY l.id ASC",
    )
    .bind(payment.id)
    .fetch_all(&pool)
    .await?;
    assert_eq!(lines, vec![(500.0, 0.0), (0.0, 500.0)]);

    assert_eq!(account_balance(&pool, "1000").await, 500.0);
    assert_eq!(account_balance(&pool, "1100").await, -500.0);

    // Mark unpaid again: a mirror-image entry restores both accounts to zero
    payments::mark(
        Extension(TenantPool(pool.clone())),
        Extension(accountant()),
        Path(payment.id),
        Json(MarkPaymentBody {
            status: "unpaid".to_string(),
        }),
    )
    .await
    .expect("mark unpaid");

    assert_eq!(entry_count(&pool, "payment_reverse", payment.id).await, 1);
    assert_eq!(account_balance(&pool, "1000").await, 0.0);
    assert_eq!(account_balance(&pool, "1100").await, 0.0);

    let report = ledger::trial_balance(&pool).await?;
    assert!((report.total_debits - report.total_credits).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn income_statement_and_balance_sheet_follow_normal_balance_rules() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;

    let payment =
        common::create_payment(&pool, contract_id, 800.0, date("2025-04-01"), "paid").await?;
    ledger::post_invoice_revenue(&pool, &payment).await?;
    ledger::post_cash_receipt(&pool, &payment).await?;

    let expense_result = sqlx::query(
        "INSERT INTO expenses (description, amount, category, vendor, spent_at, created_at, updated_at) \
         VALUES ('Plumbing', 300.0, 'maintenance', NULL, '2025-04-10', '2025-04-10T00:00:00Z', '2025-04-10T00:00:00Z')",
    )
    .execute(&pool)
    .await?;
    let expense = sqlx::query_as::<_, rentora_api::database::models::Expense>(
        "SELECT id, description, amount, category, vendor, spent_at, created_at, updated_at \
         FROM expenses WHERE id = ?1",
    )
    .bind(expense_result.last_insert_rowid())
    .fetch_one(&pool)
    .await?;
    ledger::post_expense(&pool, &expense).await?;

    let income = ledger::income_statement(&pool).await?;
    assert_eq!(income.income_total, 800.0);
    assert_eq!(income.expense_total, 300.0);
    assert_eq!(income.net_income, 500.0);

    let sheet = ledger::balance_sheet(&pool).await?;
    // Cash 800 in, 300 out; receivable recognized then collected
    let cash = sheet.assets.rows.iter().find(|r| r.code == "1000").unwrap();
    assert_eq!(cash.total, 500.0);
    let receivable = sheet.assets.rows.iter().find(|r| r.code == "1100").unwrap();
    assert_eq!(receivable.total, 0.0);
    assert_eq!(sheet.assets.total, 500.0);
    assert_eq!(sheet.liabilities.total, 0.0);
    Ok(())
}

#[tokio::test]
async fn account_ledger_keeps_running_balance_in_order() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;

    for (amount, day) in [(200.0, "2025-01-10"), (150.0, "2025-01-20")] {
        let payment = common::create_payment(&pool, contract_id, amount, date(day), "paid").await?;
        ledger::post_cash_receipt(&pool, &payment).await?;
    }

    let cash = ledger::find_account_by_code(&pool, "1000").await?.unwrap();
    let rows = ledger::account_ledger(&pool, cash.id).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].balance, 200.0);
    assert_eq!(rows[1].balance, 350.0);
    assert!(rows[0].entry_date <= rows[1].entry_date);

    let missing = ledger::account_ledger(&pool, 9999).await;
    assert!(matches!(
        missing,
        Err(rentora_api::services::ledger::LedgerError::AccountNotFound(9999))
    ));
    Ok(())
}

#[tokio::test]
async fn reconcile_posts_missing_entries_once() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Acme", "acme").await?;
    let pool = common::company_pool(&env, &company).await?;
    let contract_id = common::seed_contract(&pool).await?;

    // Business records land without any journal entries, as if every
    // best-effort posting had failed
    let paid = common::create_payment(&pool, contract_id, 500.0, date("2025-05-01"), "paid").await?;
    sqlx::query(
        "INSERT INTO invoices (payment_id, file_path, created_at, updated_at) \
         VALUES (?1, 'invoices/invoice_1.pdf', '2025-05-01T00:00:00Z', '2025-05-01T00:00:00Z')",
    )
    .bind(paid.id)
    .execute(&pool)
    .await?;
    sqlx::query(
        "INSERT INTO expenses (description, amount, category, vendor, spent_at, created_at, updated_at) \
         VALUES ('Paint', 75.0, NULL, NULL, '2025-05-02', '2025-05-02T00:00:00Z', '2025-05-02T00:00:00Z')",
    )
    .execute(&pool)
    .await?;

    let report = reconcile::reconcile_books(&pool).await?;
    assert_eq!(report.cash_receipts_posted, 1);
    assert_eq!(report.invoices_posted, 1);
    assert_eq!(report.expenses_posted, 1);
    assert_eq!(report.reversals_posted, 0);

    // A second sweep finds nothing to do
    let clean = reconcile::reconcile_books(&pool).await?;
    assert_eq!(clean.total(), 0);

    let tb = ledger::trial_balance(&pool).await?;
    assert!((tb.total_debits - tb.total_credits).abs() < 1e-9);
    Ok(())
}
