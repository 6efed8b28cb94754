use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A building or a standalone apartment. `property_type` distinguishes the
/// two; apartment metadata is only populated for standalone apartments.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub status: String,
    pub property_type: String,
    pub images: Option<String>,
    pub number: Option<String>,
    pub floor: Option<i64>,
    pub area_sqm: Option<f64>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub num_apartments: Option<i64>,
    pub num_floors: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An apartment inside a building property.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Apartment {
    pub id: i64,
    pub building_id: i64,
    pub number: Option<String>,
    pub floor: Option<i64>,
    pub area_sqm: Option<f64>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub rent_price: Option<f64>,
    pub status: String,
    pub images: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
