use chrono::{Duration, Utc};
use clap::Subcommand;
use sqlx::SqlitePool;

use crate::auth;
use crate::database::models::AccountType;
use crate::services::{ledger, registry};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum SeedCommands {
    #[command(about = "Create the super-admin account in the default database")]
    Superadmin {
        #[arg(help = "Username")]
        username: String,

        #[arg(help = "Password")]
        password: String,
    },

    #[command(about = "Seed demo users, accounts, and a contract into a company database")]
    Demo {
        #[arg(help = "Company subdomain")]
        subdomain: String,
    },
}

pub async fn handle(state: &AppState, cmd: SeedCommands) -> anyhow::Result<()> {
    match cmd {
        SeedCommands::Superadmin { username, password } => {
            let pool = state.db.default_pool().await?;
            if find_user_id(&pool, &username).await?.is_some() {
                println!("User '{}' already exists", username);
                return Ok(());
            }
            create_user(
                &pool,
                &username,
                Some(&format!("{}@example.com", username)),
                &password,
                "superadmin",
                state.config.security.bcrypt_cost,
            )
            .await?;
            println!("Super-admin '{}' created", username);
            Ok(())
        }
        SeedCommands::Demo { subdomain } => {
            let master = state.db.master_pool().await?;
            let company = registry::find_by_subdomain(&master, &subdomain)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Company '{}' not found", subdomain))?;
            let pool = state
                .db
                .get_or_create(&company.subdomain, &company.db_uri)
                .await?;
            seed_demo_data(&pool, state.config.security.bcrypt_cost).await?;
            println!("Demo data seeded into '{}'", subdomain);
            Ok(())
        }
    }
}

async fn find_user_id(pool: &SqlitePool, username: &str) -> anyhow::Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    email: Option<&str>,
    password: &str,
    role: &str,
    bcrypt_cost: u32,
) -> anyhow::Result<i64> {
    let hash = auth::hash_password(password, bcrypt_cost)?;
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO users (username, email, phone, password_hash, role, created_at, updated_at) \
         VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?5)",
    )
    .bind(username)
    .bind(email)
    .bind(&hash)
    .bind(role)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Basic role users, a minimal chart of accounts, one property, and a
/// year-long contract with three unpaid installments.
async fn seed_demo_data(pool: &SqlitePool, bcrypt_cost: u32) -> anyhow::Result<()> {
    for (username, role) in [
        ("employee", "employee"),
        ("tenant", "tenant"),
        ("accountant", "accountant"),
    ] {
        if find_user_id(pool, username).await?.is_none() {
            create_user(
                pool,
                username,
                Some(&format!("{}@example.com", username)),
                "password",
                role,
                bcrypt_cost,
            )
            .await?;
        }
    }

    ledger::get_or_create_account(pool, "1000", "Cash", AccountType::Asset).await?;
    ledger::get_or_create_account(pool, "1100", "Accounts Receivable", AccountType::Asset).await?;
    ledger::get_or_create_account(pool, "4000", "Rental Income", AccountType::Income).await?;
    ledger::get_or_create_account(pool, "5000", "General Expenses", AccountType::Expense).await?;

    let now = Utc::now();
    let today = now.date_naive();

    let property_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM properties")
        .fetch_one(pool)
        .await?;
    let property_id = if property_count.0 == 0 {
        sqlx::query(
            "INSERT INTO properties (title, description, price, status, property_type, created_at, updated_at) \
             VALUES ('Apartment A', 'Sea view', 800.0, 'available', 'apartment', ?1, ?1)",
        )
        .bind(now)
        .execute(pool)
        .await?
        .last_insert_rowid()
    } else {
        let row: (i64,) = sqlx::query_as("SELECT id FROM properties ORDER BY id ASC")
            .fetch_one(pool)
            .await?;
        row.0
    };

    let contract_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contracts")
        .fetch_one(pool)
        .await?;
    if contract_count.0 == 0 {
        let tenant_id = find_user_id(pool, "tenant")
            .await?
            .ok_or_else(|| anyhow::anyhow!("tenant user missing after seed"))?;
        let contract_id = sqlx::query(
            "INSERT INTO contracts (property_id, apartment_id, tenant_id, start_date, end_date, rent_amount, status, created_at, updated_at) \
             VALUES (?1, NULL, ?2, ?3, ?4, 800.0, 'active', ?5, ?5)",
        )
        .bind(property_id)
        .bind(tenant_id)
        .bind(today)
        .bind(today + Duration::days(365))
        .bind(now)
        .execute(pool)
        .await?
        .last_insert_rowid();

        for i in 1..=3 {
            sqlx::query(
                "INSERT INTO payments (contract_id, amount, due_date, paid_date, method, status, created_at, updated_at) \
                 VALUES (?1, 800.0, ?2, NULL, NULL, 'unpaid', ?3, ?3)",
            )
            .bind(contract_id)
            .bind(today + Duration::days(30 * i))
            .bind(now)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}
