use sqlx::SqlitePool;
use tracing::info;

use super::manager::DatabaseError;

/// Table whose presence marks an initialized tenant database.
pub const MARKER_TABLE: &str = "users";

/// Check whether a table exists on the given connection.
pub async fn has_table(pool: &SqlitePool, name: &str) -> Result<bool, DatabaseError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

/// Create the full domain schema on a tenant connection if it is missing.
///
/// Safe to call on an already-initialized database: the marker table check
/// short-circuits, and every statement is IF NOT EXISTS in any case.
pub async fn ensure_tenant_schema(pool: &SqlitePool) -> Result<(), DatabaseError> {
    if has_table(pool, MARKER_TABLE).await? {
        return Ok(());
    }
    for statement in TENANT_DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("created tenant schema");
    Ok(())
}

/// Create the master registry schema (companies table) if it is missing.
pub async fn ensure_master_schema(pool: &SqlitePool) -> Result<(), DatabaseError> {
    for statement in MASTER_DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const MASTER_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS companies (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        name            TEXT NOT NULL UNIQUE,
        subdomain       TEXT NOT NULL UNIQUE,
        db_uri          TEXT NOT NULL,
        logo_path       TEXT,
        primary_color   TEXT NOT NULL DEFAULT '#0d6efd',
        secondary_color TEXT NOT NULL DEFAULT '#6c757d',
        font_family     TEXT NOT NULL DEFAULT 'system-ui, -apple-system, Segoe UI, Roboto',
        is_active       INTEGER NOT NULL DEFAULT 1,
        is_archived     INTEGER NOT NULL DEFAULT 0,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_companies_subdomain ON companies (subdomain)",
];

const TENANT_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        username      TEXT NOT NULL UNIQUE,
        email         TEXT UNIQUE,
        phone         TEXT UNIQUE,
        password_hash TEXT NOT NULL,
        role          TEXT NOT NULL,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_role ON users (role)",
    r#"
    CREATE TABLE IF NOT EXISTS properties (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        title          TEXT NOT NULL,
        description    TEXT,
        price          REAL NOT NULL DEFAULT 0,
        status         TEXT NOT NULL DEFAULT 'available',
        property_type  TEXT NOT NULL DEFAULT 'building',
        images         TEXT,
        number         TEXT,
        floor          INTEGER,
        area_sqm       REAL,
        bedrooms       INTEGER,
        bathrooms      INTEGER,
        num_apartments INTEGER,
        num_floors     INTEGER,
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_properties_type ON properties (property_type)",
    r#"
    CREATE TABLE IF NOT EXISTS apartments (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        building_id INTEGER NOT NULL REFERENCES properties (id),
        number      TEXT,
        floor       INTEGER,
        area_sqm    REAL,
        bedrooms    INTEGER,
        bathrooms   INTEGER,
        rent_price  REAL,
        status      TEXT NOT NULL DEFAULT 'available',
        images      TEXT,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_apartments_building ON apartments (building_id)",
    r#"
    CREATE TABLE IF NOT EXISTS contracts (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        property_id   INTEGER NOT NULL REFERENCES properties (id),
        apartment_id  INTEGER REFERENCES apartments (id),
        tenant_id     INTEGER NOT NULL REFERENCES users (id),
        start_date    TEXT NOT NULL,
        end_date      TEXT NOT NULL,
        rent_amount   REAL NOT NULL,
        status        TEXT NOT NULL DEFAULT 'active',
        document_path TEXT,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_contracts_property ON contracts (property_id)",
    "CREATE INDEX IF NOT EXISTS idx_contracts_tenant ON contracts (tenant_id)",
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        contract_id INTEGER NOT NULL REFERENCES contracts (id),
        amount      REAL NOT NULL,
        due_date    TEXT NOT NULL,
        paid_date   TEXT,
        method      TEXT,
        status      TEXT NOT NULL DEFAULT 'unpaid',
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_payments_contract ON payments (contract_id)",
    "CREATE INDEX IF NOT EXISTS idx_payments_status ON payments (status)",
    r#"
    CREATE TABLE IF NOT EXISTS invoices (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        payment_id INTEGER NOT NULL UNIQUE REFERENCES payments (id),
        file_path  TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS expenses (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        description TEXT NOT NULL,
        amount      REAL NOT NULL,
        category    TEXT,
        vendor      TEXT,
        spent_at    TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS maintenance_requests (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_id   INTEGER NOT NULL REFERENCES users (id),
        property_id INTEGER REFERENCES properties (id),
        title       TEXT NOT NULL,
        description TEXT NOT NULL,
        status      TEXT NOT NULL DEFAULT 'new',
        notes       TEXT,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS complaints (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_id   INTEGER NOT NULL REFERENCES users (id),
        subject     TEXT NOT NULL,
        description TEXT NOT NULL,
        status      TEXT NOT NULL DEFAULT 'new',
        notes       TEXT,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        code       TEXT NOT NULL UNIQUE,
        name       TEXT NOT NULL,
        kind       TEXT NOT NULL,
        parent_id  INTEGER REFERENCES accounts (id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_accounts_kind ON accounts (kind)",
    r#"
    CREATE TABLE IF NOT EXISTS journal_entries (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_date TEXT NOT NULL,
        memo       TEXT,
        source     TEXT,
        source_id  INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_journal_entries_source ON journal_entries (source, source_id)",
    r#"
    CREATE TABLE IF NOT EXISTS journal_lines (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id   INTEGER NOT NULL REFERENCES journal_entries (id),
        account_id INTEGER NOT NULL REFERENCES accounts (id),
        debit      REAL NOT NULL DEFAULT 0,
        credit     REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_journal_lines_entry ON journal_lines (entry_id)",
    "CREATE INDEX IF NOT EXISTS idx_journal_lines_account ON journal_lines (account_id)",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tenant_schema_is_idempotent() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        assert!(!has_table(&pool, MARKER_TABLE).await.unwrap());

        ensure_tenant_schema(&pool).await.unwrap();
        assert!(has_table(&pool, "users").await.unwrap());
        assert!(has_table(&pool, "journal_lines").await.unwrap());

        // Second run is a no-op
        ensure_tenant_schema(&pool).await.unwrap();
        pool.close().await;
    }

    #[tokio::test]
    async fn master_schema_creates_companies() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_master_schema(&pool).await.unwrap();
        ensure_master_schema(&pool).await.unwrap();
        assert!(has_table(&pool, "companies").await.unwrap());
        pool.close().await;
    }
}
