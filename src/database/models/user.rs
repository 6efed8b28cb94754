use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_superadmin(&self) -> bool {
        self.role == "superadmin"
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn is_accountant(&self) -> bool {
        self.role == "accountant"
    }

    pub fn is_employee(&self) -> bool {
        self.role == "employee"
    }

    pub fn is_tenant(&self) -> bool {
        self.role == "tenant"
    }
}
