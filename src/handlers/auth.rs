use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::warn;

use crate::auth::{self, Claims};
use crate::database::models::{Company, User};
use crate::error::ApiError;
use crate::services::registry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

const USER_COLUMNS: &str =
    "id, username, email, phone, password_hash, role, created_at, updated_at";

/// POST /auth/login - authenticate and receive a JWT
///
/// There is no username-to-company index: the credentials are tried against
/// every active company database in creation order, and the first database
/// that verifies them wins. Duplicate usernames across companies therefore
/// resolve to the oldest company. After the scan, one fixed check covers
/// the super-admin account in the global default database. O(active
/// companies) per attempt — acceptable while the company count stays small.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let master = state.db.master_pool().await?;
    for company in registry::list_active(&master).await? {
        let pool = match state
            .db
            .get_or_create(&company.subdomain, &company.db_uri)
            .await
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(subdomain = %company.subdomain, error = %e, "skipping unreachable company during login");
                continue;
            }
        };

        match find_user(&pool, username).await {
            Ok(Some(user)) if auth::verify_password(&payload.password, &user.password_hash) => {
                return issue_token(&state, &user, Some(&company));
            }
            Ok(_) => {}
            Err(e) => {
                // Uninitialized or broken tenant database; keep scanning
                warn!(subdomain = %company.subdomain, error = %e, "login probe failed; skipping company");
            }
        }
    }

    // Fixed check: the super-admin account lives in the default database
    let default_pool = state.db.default_pool().await?;
    if let Ok(Some(user)) = find_user(&default_pool, username).await {
        if user.is_superadmin() && auth::verify_password(&payload.password, &user.password_hash) {
            return issue_token(&state, &user, None);
        }
    }

    Err(ApiError::unauthorized("Invalid credentials"))
}

async fn find_user(pool: &SqlitePool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?1",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

fn issue_token(
    state: &AppState,
    user: &User,
    company: Option<&Company>,
) -> Result<Json<Value>, ApiError> {
    let claims = Claims::new(
        user,
        company.map(|c| c.id),
        state.config.security.jwt_expiry_hours,
    );
    let token = auth::generate_jwt(&claims, &state.config.security)
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token,
            "user": {
                "id": user.id,
                "username": user.username,
                "role": user.role,
                "company_id": company.map(|c| c.id),
                "company": company.map(|c| c.subdomain.clone()),
            },
            "expires_in": state.config.security.jwt_expiry_hours * 3600,
        }
    })))
}
