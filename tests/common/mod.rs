#![allow(dead_code)]

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

use rentora_api::auth;
use rentora_api::config::{
    AppConfig, DatabaseConfig, Environment, SecurityConfig, StorageConfig,
};
use rentora_api::database::models::{Company, Payment};
use rentora_api::services::provisioning::{self, CreateCompanyRequest};
use rentora_api::services::registry::Branding;
use rentora_api::state::AppState;

/// An isolated application instance over a temporary directory: its own
/// master registry, default database, and companies/backups directories.
pub struct TestEnv {
    pub state: Arc<AppState>,
    dir: TempDir,
}

impl TestEnv {
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

pub async fn test_env() -> Result<TestEnv> {
    let dir = tempfile::tempdir()?;
    let config = AppConfig {
        environment: Environment::Development,
        database: DatabaseConfig {
            master_url: format!("sqlite://{}/master.db", dir.path().display()),
            default_url: format!("sqlite://{}/app.db", dir.path().display()),
            max_connections: 5,
        },
        storage: StorageConfig {
            companies_dir: dir.path().join("companies"),
            backups_dir: dir.path().join("backups"),
        },
        security: SecurityConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expiry_hours: 1,
            bcrypt_cost: 4,
        },
    };
    let state = AppState::initialize(config).await?;
    Ok(TestEnv { state, dir })
}

pub async fn create_company(env: &TestEnv, name: &str, subdomain: &str) -> Result<Company> {
    let company = provisioning::create_company(
        &env.state,
        CreateCompanyRequest {
            name: name.to_string(),
            subdomain: subdomain.to_string(),
            db_uri: None,
            branding: Branding::default(),
        },
    )
    .await?;
    Ok(company)
}

pub async fn company_pool(env: &TestEnv, company: &Company) -> Result<SqlitePool> {
    Ok(env
        .state
        .db
        .get_or_create(&company.subdomain, &company.db_uri)
        .await?)
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    role: &str,
) -> Result<i64> {
    let hash = auth::hash_password(password, 4)?;
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO users (username, email, phone, password_hash, role, created_at, updated_at) \
         VALUES (?1, NULL, NULL, ?2, ?3, ?4, ?4)",
    )
    .bind(username)
    .bind(&hash)
    .bind(role)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Minimal tenant/property/contract chain so payments have something to
/// hang off. Returns the contract id.
pub async fn seed_contract(pool: &SqlitePool) -> Result<i64> {
    let now = Utc::now();
    let today = now.date_naive();

    let tenant_id = create_user(pool, &format!("tenant-{}", uuid_suffix()), "password", "tenant").await?;

    let property_id = sqlx::query(
        "INSERT INTO properties (title, description, price, status, property_type, created_at, updated_at) \
         VALUES ('Unit 1', NULL, 500.0, 'available', 'apartment', ?1, ?1)",
    )
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    let contract_id = sqlx::query(
        "INSERT INTO contracts (property_id, apartment_id, tenant_id, start_date, end_date, rent_amount, status, created_at, updated_at) \
         VALUES (?1, NULL, ?2, ?3, ?4, 500.0, 'active', ?5, ?5)",
    )
    .bind(property_id)
    .bind(tenant_id)
    .bind(today)
    .bind(today + Duration::days(365))
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(contract_id)
}

pub async fn create_payment(
    pool: &SqlitePool,
    contract_id: i64,
    amount: f64,
    due_date: NaiveDate,
    status: &str,
) -> Result<Payment> {
    let now = Utc::now();
    let paid_date = (status == "paid").then(|| now.date_naive());
    let id = sqlx::query(
        "INSERT INTO payments (contract_id, amount, due_date, paid_date, method, status, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?6)",
    )
    .bind(contract_id)
    .bind(amount)
    .bind(due_date)
    .bind(paid_date)
    .bind(status)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();
    fetch_payment(pool, id).await
}

pub async fn fetch_payment(pool: &SqlitePool, id: i64) -> Result<Payment> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT id, contract_id, amount, due_date, paid_date, method, status, created_at, updated_at \
         FROM payments WHERE id = ?1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(payment)
}

fn uuid_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
