use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::database::models::Company;

/// Errors from the company registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Company already exists: {0}")]
    Duplicate(String),

    #[error("Company not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Branding {
    pub logo_path: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    pub font_family: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            logo_path: None,
            primary_color: "#0d6efd".to_string(),
            secondary_color: "#6c757d".to_string(),
            font_family: "system-ui, -apple-system, Segoe UI, Roboto".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub subdomain: String,
    pub db_uri: String,
    pub branding: Branding,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub logo_path: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub font_family: Option<String>,
    pub is_active: Option<bool>,
    pub is_archived: Option<bool>,
}

const COMPANY_COLUMNS: &str = "id, name, subdomain, db_uri, logo_path, primary_color, \
     secondary_color, font_family, is_active, is_archived, created_at, updated_at";

/// Register a new company. Fails with [`RegistryError::Duplicate`] when the
/// name or subdomain is already taken.
pub async fn create(pool: &SqlitePool, new: NewCompany) -> Result<Company, RegistryError> {
    let taken: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM companies WHERE name = ?1 OR subdomain = ?2")
            .bind(&new.name)
            .bind(&new.subdomain)
            .fetch_one(pool)
            .await?;
    if taken.0 > 0 {
        return Err(RegistryError::Duplicate(new.subdomain));
    }

    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO companies
            (name, subdomain, db_uri, logo_path, primary_color, secondary_color,
             font_family, is_active, is_archived, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 0, ?8, ?8)
        "#,
    )
    .bind(&new.name)
    .bind(&new.subdomain)
    .bind(&new.db_uri)
    .bind(&new.branding.logo_path)
    .bind(&new.branding.primary_color)
    .bind(&new.branding.secondary_color)
    .bind(&new.branding.font_family)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RegistryError::Duplicate(new.subdomain.clone())
        } else {
            RegistryError::Sqlx(e)
        }
    })?;

    find_by_id(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| RegistryError::NotFound(new.subdomain))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Company>, RegistryError> {
    let company = sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE id = ?1",
        COMPANY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(company)
}

pub async fn find_by_subdomain(
    pool: &SqlitePool,
    subdomain: &str,
) -> Result<Option<Company>, RegistryError> {
    let company = sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE subdomain = ?1",
        COMPANY_COLUMNS
    ))
    .bind(subdomain)
    .fetch_optional(pool)
    .await?;
    Ok(company)
}

/// Active, non-archived companies in creation order. Creation order matters:
/// the login scan visits tenants in this order and the first username match
/// wins.
pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Company>, RegistryError> {
    let companies = sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE is_active = 1 AND is_archived = 0 \
         ORDER BY created_at ASC, id ASC",
        COMPANY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(companies)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Company>, RegistryError> {
    let companies = sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies ORDER BY created_at ASC, id ASC",
        COMPANY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(companies)
}

pub async fn update(
    pool: &SqlitePool,
    id: i64,
    fields: CompanyUpdate,
) -> Result<Company, RegistryError> {
    let result = sqlx::query(
        r#"
        UPDATE companies SET
            name            = COALESCE(?1, name),
            logo_path       = COALESCE(?2, logo_path),
            primary_color   = COALESCE(?3, primary_color),
            secondary_color = COALESCE(?4, secondary_color),
            font_family     = COALESCE(?5, font_family),
            is_active       = COALESCE(?6, is_active),
            is_archived     = COALESCE(?7, is_archived),
            updated_at      = ?8
        WHERE id = ?9
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.logo_path)
    .bind(&fields.primary_color)
    .bind(&fields.secondary_color)
    .bind(&fields.font_family)
    .bind(fields.is_active)
    .bind(fields.is_archived)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RegistryError::Duplicate(format!("company #{}", id))
        } else {
            RegistryError::Sqlx(e)
        }
    })?;

    if result.rows_affected() == 0 {
        return Err(RegistryError::NotFound(format!("company #{}", id)));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RegistryError::NotFound(format!("company #{}", id)))
}

/// Soft-delete: the company disappears from login and binding but its
/// registry row and database survive.
pub async fn archive(pool: &SqlitePool, id: i64) -> Result<(), RegistryError> {
    let result =
        sqlx::query("UPDATE companies SET is_archived = 1, is_active = 0, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(RegistryError::NotFound(format!("company #{}", id)));
    }
    Ok(())
}

/// Remove the registry row. The underlying tenant database is a separate
/// physical resource; its removal is the provisioning layer's concern.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), RegistryError> {
    let result = sqlx::query("DELETE FROM companies WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RegistryError::NotFound(format!("company #{}", id)));
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::bootstrap::ensure_master_schema;

    async fn master_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_master_schema(&pool).await.unwrap();
        pool
    }

    fn new_company(name: &str, subdomain: &str) -> NewCompany {
        NewCompany {
            name: name.to_string(),
            subdomain: subdomain.to_string(),
            db_uri: format!("sqlite://data/companies/{}.db", subdomain),
            branding: Branding::default(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let pool = master_pool().await;
        create(&pool, new_company("Acme", "acme")).await.unwrap();

        let err = create(&pool, new_company("Acme", "acme2")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));

        let err = create(&pool, new_company("Other", "acme")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
        pool.close().await;
    }

    #[tokio::test]
    async fn list_active_skips_archived_and_inactive() {
        let pool = master_pool().await;
        let a = create(&pool, new_company("A", "a")).await.unwrap();
        let b = create(&pool, new_company("B", "b")).await.unwrap();
        create(&pool, new_company("C", "c")).await.unwrap();

        archive(&pool, b.id).await.unwrap();
        update(
            &pool,
            a.id,
            CompanyUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let active = list_active(&pool).await.unwrap();
        assert_eq!(
            active.iter().map(|c| c.subdomain.as_str()).collect::<Vec<_>>(),
            vec!["c"]
        );
        pool.close().await;
    }

    #[tokio::test]
    async fn list_active_preserves_creation_order() {
        let pool = master_pool().await;
        for key in ["first", "second", "third"] {
            create(&pool, new_company(key, key)).await.unwrap();
        }
        let active = list_active(&pool).await.unwrap();
        assert_eq!(
            active.iter().map(|c| c.subdomain.as_str()).collect::<Vec<_>>(),
            vec!["first", "second", "third"]
        );
        pool.close().await;
    }

    #[tokio::test]
    async fn delete_removes_registry_row_only() {
        let pool = master_pool().await;
        let c = create(&pool, new_company("Gone", "gone")).await.unwrap();
        delete(&pool, c.id).await.unwrap();
        assert!(find_by_subdomain(&pool, "gone").await.unwrap().is_none());
        assert!(matches!(
            delete(&pool, c.id).await,
            Err(RegistryError::NotFound(_))
        ));
        pool.close().await;
    }
}
