use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::database::models::{Account, AccountType, Expense, Payment};

/// Errors from the posting engine. Callers on business paths catch and log
/// these rather than failing the triggering operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// What a posting call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingOutcome {
    /// A new balanced entry was written.
    Posted { entry_id: i64 },
    /// An entry with the same (source, source_id) already exists; no-op.
    AlreadyPosted,
    /// A reversal was requested but no original entry exists; no-op.
    MissingSource,
}

pub const SOURCE_PAYMENT: &str = "payment";
pub const SOURCE_PAYMENT_REVERSE: &str = "payment_reverse";
pub const SOURCE_INVOICE: &str = "invoice";
pub const SOURCE_EXPENSE: &str = "expense";

const ACCOUNT_COLUMNS: &str = "id, code, name, kind, parent_id, created_at, updated_at";

/// The minimal chart of accounts the posting paths rely on.
struct DefaultAccounts {
    cash: Account,
    receivable: Account,
    rental_income: Account,
    general_expenses: Account,
}

async fn default_accounts(pool: &SqlitePool) -> Result<DefaultAccounts, LedgerError> {
    Ok(DefaultAccounts {
        cash: get_or_create_account(pool, "1000", "Cash", AccountType::Asset).await?,
        receivable: get_or_create_account(pool, "1100", "Accounts Receivable", AccountType::Asset)
            .await?,
        rental_income: get_or_create_account(pool, "4000", "Rental Income", AccountType::Income)
            .await?,
        general_expenses: get_or_create_account(
            pool,
            "5000",
            "General Expenses",
            AccountType::Expense,
        )
        .await?,
    })
}

/// Look up an account by code, creating it when absent. Concurrent callers
/// converge on one row: the insert ignores a code collision and the row is
/// re-read afterwards.
pub async fn get_or_create_account(
    pool: &SqlitePool,
    code: &str,
    name: &str,
    kind: AccountType,
) -> Result<Account, LedgerError> {
    if let Some(account) = find_account_by_code(pool, code).await? {
        return Ok(account);
    }
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO accounts (code, name, kind, parent_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, NULL, ?4, ?4) ON CONFLICT (code) DO NOTHING",
    )
    .bind(code)
    .bind(name)
    .bind(kind)
    .bind(now)
    .execute(pool)
    .await?;

    find_account_by_code(pool, code)
        .await?
        .ok_or(LedgerError::Sqlx(sqlx::Error::RowNotFound))
}

pub async fn find_account_by_code(
    pool: &SqlitePool,
    code: &str,
) -> Result<Option<Account>, LedgerError> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM accounts WHERE code = ?1",
        ACCOUNT_COLUMNS
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

pub async fn find_account_by_id(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Account>, LedgerError> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM accounts WHERE id = ?1",
        ACCOUNT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

pub async fn list_accounts(pool: &SqlitePool) -> Result<Vec<Account>, LedgerError> {
    let accounts = sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM accounts ORDER BY kind ASC, code ASC",
        ACCOUNT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(accounts)
}

/// Idempotency probe: id of the entry recorded for (source, source_id).
pub async fn find_entry_by_source(
    pool: &SqlitePool,
    source: &str,
    source_id: i64,
) -> Result<Option<i64>, LedgerError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM journal_entries WHERE source = ?1 AND source_id = ?2")
            .bind(source)
            .bind(source_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|r| r.0))
}

/// Write one balanced two-line entry atomically: entry first to obtain its
/// id, then the debit and credit lines, all in a single transaction.
async fn post_two_line(
    pool: &SqlitePool,
    entry_date: NaiveDate,
    memo: &str,
    source: &str,
    source_id: i64,
    debit_account: &Account,
    credit_account: &Account,
    amount: f64,
) -> Result<i64, LedgerError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO journal_entries (entry_date, memo, source, source_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(entry_date)
    .bind(memo)
    .bind(source)
    .bind(source_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let entry_id = result.last_insert_rowid();

    sqlx::query(
        "INSERT INTO journal_lines (entry_id, account_id, debit, credit, created_at, updated_at) \
         VALUES (?1, ?2, ?3, 0, ?4, ?4)",
    )
    .bind(entry_id)
    .bind(debit_account.id)
    .bind(amount)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO journal_lines (entry_id, account_id, debit, credit, created_at, updated_at) \
         VALUES (?1, ?2, 0, ?3, ?4, ?4)",
    )
    .bind(entry_id)
    .bind(credit_account.id)
    .bind(amount)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(entry_id)
}

/// Payment marked paid: debit Cash, credit Accounts Receivable.
pub async fn post_cash_receipt(
    pool: &SqlitePool,
    payment: &Payment,
) -> Result<PostingOutcome, LedgerError> {
    if find_entry_by_source(pool, SOURCE_PAYMENT, payment.id)
        .await?
        .is_some()
    {
        return Ok(PostingOutcome::AlreadyPosted);
    }
    let acc = default_accounts(pool).await?;
    let entry_date = payment.paid_date.unwrap_or_else(today);
    let entry_id = post_two_line(
        pool,
        entry_date,
        &format!("Cash receipt for payment #{}", payment.id),
        SOURCE_PAYMENT,
        payment.id,
        &acc.cash,
        &acc.receivable,
        payment.amount,
    )
    .await?;
    Ok(PostingOutcome::Posted { entry_id })
}

/// Payment marked unpaid again: the original entry stands and a mirror-image
/// entry cancels it. No-op when there is nothing to reverse or the reversal
/// was already written.
pub async fn reverse_cash_receipt(
    pool: &SqlitePool,
    payment: &Payment,
) -> Result<PostingOutcome, LedgerError> {
    if find_entry_by_source(pool, SOURCE_PAYMENT, payment.id)
        .await?
        .is_none()
    {
        return Ok(PostingOutcome::MissingSource);
    }
    if find_entry_by_source(pool, SOURCE_PAYMENT_REVERSE, payment.id)
        .await?
        .is_some()
    {
        return Ok(PostingOutcome::AlreadyPosted);
    }
    let acc = default_accounts(pool).await?;
    let entry_id = post_two_line(
        pool,
        today(),
        &format!("Reversal cash receipt for payment #{}", payment.id),
        SOURCE_PAYMENT_REVERSE,
        payment.id,
        &acc.receivable,
        &acc.cash,
        payment.amount,
    )
    .await?;
    Ok(PostingOutcome::Posted { entry_id })
}

/// Invoice generated for a payment: debit Accounts Receivable, credit
/// Rental Income.
pub async fn post_invoice_revenue(
    pool: &SqlitePool,
    payment: &Payment,
) -> Result<PostingOutcome, LedgerError> {
    if find_entry_by_source(pool, SOURCE_INVOICE, payment.id)
        .await?
        .is_some()
    {
        return Ok(PostingOutcome::AlreadyPosted);
    }
    let acc = default_accounts(pool).await?;
    let entry_id = post_two_line(
        pool,
        payment.due_date,
        &format!("Invoice for payment #{}", payment.id),
        SOURCE_INVOICE,
        payment.id,
        &acc.receivable,
        &acc.rental_income,
        payment.amount,
    )
    .await?;
    Ok(PostingOutcome::Posted { entry_id })
}

/// Expense recorded: debit General Expenses, credit Cash.
pub async fn post_expense(
    pool: &SqlitePool,
    expense: &Expense,
) -> Result<PostingOutcome, LedgerError> {
    if find_entry_by_source(pool, SOURCE_EXPENSE, expense.id)
        .await?
        .is_some()
    {
        return Ok(PostingOutcome::AlreadyPosted);
    }
    let acc = default_accounts(pool).await?;
    let entry_id = post_two_line(
        pool,
        expense.spent_at,
        &format!("Expense: {}", expense.description),
        SOURCE_EXPENSE,
        expense.id,
        &acc.general_expenses,
        &acc.cash,
        expense.amount,
    )
    .await?;
    Ok(PostingOutcome::Posted { entry_id })
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Read side: ledger, trial balance, income statement, balance sheet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LedgerRow {
    pub entry_date: NaiveDate,
    pub memo: Option<String>,
    pub debit: f64,
    pub credit: f64,
    pub balance: f64,
}

/// Per-account ledger with a running balance on the account's normal side,
/// ordered by entry date, then entry id, then line id.
pub async fn account_ledger(
    pool: &SqlitePool,
    account_id: i64,
) -> Result<Vec<LedgerRow>, LedgerError> {
    let account = find_account_by_id(pool, account_id)
        .await?
        .ok_or(LedgerError::AccountNotFound(account_id))?;

    let rows: Vec<(NaiveDate, Option<String>, f64, f64)> = sqlx::query_as(
        "SELECT e.entry_date, e.memo, l.debit, l.credit \
         FROM journal_lines l \
         JOIN journal_entries e ON e.id = l.entry_id \
         WHERE l.account_id = ?1 \
         ORDER BY e.entry_date ASC, e.id ASC, l.id ASC",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    let mut running = 0.0;
    let mut ledger = Vec::with_capacity(rows.len());
    for (entry_date, memo, debit, credit) in rows {
        if account.is_debit_normal() {
            running += debit - credit;
        } else {
            running += credit - debit;
        }
        ledger.push(LedgerRow {
            entry_date,
            memo,
            debit,
            credit,
            balance: round2(running),
        });
    }
    Ok(ledger)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TrialBalanceRow {
    pub account_id: i64,
    pub code: String,
    pub name: String,
    pub kind: AccountType,
    pub debits: f64,
    pub credits: f64,
    #[sqlx(default)]
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: f64,
    pub total_credits: f64,
}

/// Group every journal line by account. The global double-entry invariant
/// holds when `total_debits == total_credits`.
pub async fn trial_balance(pool: &SqlitePool) -> Result<TrialBalance, LedgerError> {
    let mut rows: Vec<TrialBalanceRow> = sqlx::query_as(
        "SELECT a.id AS account_id, a.code, a.name, a.kind, \
                COALESCE(SUM(l.debit), 0.0) AS debits, \
                COALESCE(SUM(l.credit), 0.0) AS credits \
         FROM journal_lines l \
         JOIN accounts a ON a.id = l.account_id \
         GROUP BY a.id, a.code, a.name, a.kind \
         ORDER BY a.code ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut total_debits = 0.0;
    let mut total_credits = 0.0;
    for row in &mut rows {
        row.balance = if row.kind.is_debit_normal() {
            round2(row.debits - row.credits)
        } else {
            round2(row.credits - row.debits)
        };
        total_debits += row.debits;
        total_credits += row.credits;
    }

    Ok(TrialBalance {
        rows,
        total_debits: round2(total_debits),
        total_credits: round2(total_credits),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountTotal {
    pub account_id: i64,
    pub code: String,
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncomeStatement {
    pub income: Vec<AccountTotal>,
    pub expenses: Vec<AccountTotal>,
    pub income_total: f64,
    pub expense_total: f64,
    pub net_income: f64,
}

pub async fn income_statement(pool: &SqlitePool) -> Result<IncomeStatement, LedgerError> {
    let income = kind_totals(pool, AccountType::Income).await?;
    let expenses = kind_totals(pool, AccountType::Expense).await?;
    let income_total = round2(income.iter().map(|r| r.total).sum());
    let expense_total = round2(expenses.iter().map(|r| r.total).sum());
    Ok(IncomeStatement {
        income,
        expenses,
        income_total,
        expense_total,
        net_income: round2(income_total - expense_total),
    })
}

/// Posted totals for one account kind on its normal side. Only accounts with
/// activity appear; income statement sections are inherently flow reports.
async fn kind_totals(
    pool: &SqlitePool,
    kind: AccountType,
) -> Result<Vec<AccountTotal>, LedgerError> {
    let rows: Vec<(i64, String, String, f64, f64)> = sqlx::query_as(
        "SELECT a.id, a.code, a.name, \
                COALESCE(SUM(l.debit), 0.0), COALESCE(SUM(l.credit), 0.0) \
         FROM accounts a \
         JOIN journal_lines l ON l.account_id = a.id \
         WHERE a.kind = ?1 \
         GROUP BY a.id, a.code, a.name \
         ORDER BY a.code ASC",
    )
    .bind(kind)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(account_id, code, name, debits, credits)| AccountTotal {
            account_id,
            code,
            name,
            total: if kind.is_debit_normal() {
                round2(debits - credits)
            } else {
                round2(credits - debits)
            },
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceSheetSection {
    pub rows: Vec<AccountTotal>,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceSheet {
    pub assets: BalanceSheetSection,
    pub liabilities: BalanceSheetSection,
    pub equity: BalanceSheetSection,
}

pub async fn balance_sheet(pool: &SqlitePool) -> Result<BalanceSheet, LedgerError> {
    Ok(BalanceSheet {
        assets: section_balances(pool, AccountType::Asset).await?,
        liabilities: section_balances(pool, AccountType::Liability).await?,
        equity: section_balances(pool, AccountType::Equity).await?,
    })
}

/// Balance per account of one kind, zero-activity accounts included — the
/// balance sheet lists the whole chart for its sections.
async fn section_balances(
    pool: &SqlitePool,
    kind: AccountType,
) -> Result<BalanceSheetSection, LedgerError> {
    let rows: Vec<(i64, String, String, f64, f64)> = sqlx::query_as(
        "SELECT a.id, a.code, a.name, \
                COALESCE(SUM(l.debit), 0.0), COALESCE(SUM(l.credit), 0.0) \
         FROM accounts a \
         LEFT JOIN journal_lines l ON l.account_id = a.id \
         WHERE a.kind = ?1 \
         GROUP BY a.id, a.code, a.name \
         ORDER BY a.code ASC",
    )
    .bind(kind)
    .fetch_all(pool)
    .await?;

    let rows: Vec<AccountTotal> = rows
        .into_iter()
        .map(|(account_id, code, name, debits, credits)| AccountTotal {
            account_id,
            code,
            name,
            total: if kind.is_debit_normal() {
                round2(debits - credits)
            } else {
                round2(credits - debits)
            },
        })
        .collect();
    let total = round2(rows.iter().map(|r| r.total).sum());
    Ok(BalanceSheetSection { rows, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::bootstrap::ensure_tenant_schema;

    async fn tenant_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_tenant_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn account_get_or_create_is_idempotent() {
        let pool = tenant_pool().await;
        let first = get_or_create_account(&pool, "1000", "Cash", AccountType::Asset)
            .await
            .unwrap();
        let second = get_or_create_account(&pool, "1000", "Cash", AccountType::Asset)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        pool.close().await;
    }

    #[tokio::test]
    async fn two_line_entries_balance() {
        let pool = tenant_pool().await;
        let cash = get_or_create_account(&pool, "1000", "Cash", AccountType::Asset)
            .await
            .unwrap();
        let ar = get_or_create_account(&pool, "1100", "Accounts Receivable", AccountType::Asset)
            .await
            .unwrap();

        let entry_id = post_two_line(
            &pool,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            "test entry",
            SOURCE_PAYMENT,
            7,
            &cash,
            &ar,
            125.50,
        )
        .await
        .unwrap();

        let (debits, credits): (f64, f64) = sqlx::query_as(
            "SELECT COALESCE(SUM(debit), 0.0), COALESCE(SUM(credit), 0.0) \
             FROM journal_lines WHERE entry_id = ?1",
        )
        .bind(entry_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(debits, credits);
        assert_eq!(debits, 125.50);
        pool.close().await;
    }
}
