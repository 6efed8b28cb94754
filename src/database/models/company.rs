use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Master-registry record for one customer company. The `subdomain` doubles
/// as the bind key for the engine cache; `db_uri` is opaque apart from
/// local-file scheme recognition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub subdomain: String,
    pub db_uri: String,
    pub logo_path: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    pub font_family: String,
    pub is_active: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
