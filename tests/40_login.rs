mod common;

use anyhow::Result;
use axum::extract::State;
use axum::Json;

use rentora_api::error::ApiError;
use rentora_api::handlers::auth::{login, LoginRequest};
use rentora_api::services::registry;

async fn try_login(
    env: &common::TestEnv,
    username: &str,
    password: &str,
) -> Result<serde_json::Value, ApiError> {
    login(
        State(env.state.clone()),
        Json(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }),
    )
    .await
    .map(|Json(body)| body)
}

#[tokio::test]
async fn duplicate_usernames_resolve_to_oldest_company() -> Result<()> {
    let env = common::test_env().await?;
    let one = common::create_company(&env, "One", "one").await?;
    let two = common::create_company(&env, "Two", "two").await?;

    let pool_one = common::company_pool(&env, &one).await?;
    let pool_two = common::company_pool(&env, &two).await?;
    common::create_user(&pool_one, "joint", "password", "admin").await?;
    common::create_user(&pool_two, "joint", "password", "admin").await?;

    let body = try_login(&env, "joint", "password").await.expect("login");
    assert_eq!(body["data"]["user"]["company_id"], one.id);
    assert_eq!(body["data"]["user"]["company"], "one");
    assert!(body["data"]["token"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn scan_passes_over_non_matching_credentials() -> Result<()> {
    let env = common::test_env().await?;
    let one = common::create_company(&env, "One", "one").await?;
    let two = common::create_company(&env, "Two", "two").await?;

    // Same username in both, but only the second company's password matches
    let pool_one = common::company_pool(&env, &one).await?;
    let pool_two = common::company_pool(&env, &two).await?;
    common::create_user(&pool_one, "joint", "first-secret", "admin").await?;
    common::create_user(&pool_two, "joint", "second-secret", "admin").await?;

    let body = try_login(&env, "joint", "second-secret").await.expect("login");
    assert_eq!(body["data"]["user"]["company_id"], two.id);
    Ok(())
}

#[tokio::test]
async fn unknown_credentials_are_rejected() -> Result<()> {
    let env = common::test_env().await?;
    common::create_company(&env, "One", "one").await?;

    let err = try_login(&env, "nobody", "password").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    Ok(())
}

#[tokio::test]
async fn superadmin_authenticates_against_default_database() -> Result<()> {
    let env = common::test_env().await?;
    common::create_company(&env, "One", "one").await?;

    let default_pool = env.state.db.default_pool().await?;
    common::create_user(&default_pool, "root", "master-key", "superadmin").await?;

    let body = try_login(&env, "root", "master-key").await.expect("login");
    assert_eq!(body["data"]["user"]["role"], "superadmin");
    assert!(body["data"]["user"]["company_id"].is_null());
    Ok(())
}

#[tokio::test]
async fn default_database_check_is_superadmin_only() -> Result<()> {
    let env = common::test_env().await?;

    let default_pool = env.state.db.default_pool().await?;
    common::create_user(&default_pool, "plain", "password", "employee").await?;

    let err = try_login(&env, "plain", "password").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    Ok(())
}

#[tokio::test]
async fn archived_company_users_cannot_log_in() -> Result<()> {
    let env = common::test_env().await?;
    let company = common::create_company(&env, "Gone", "gone").await?;
    let pool = common::company_pool(&env, &company).await?;
    common::create_user(&pool, "ghost", "password", "admin").await?;

    let master = env.state.db.master_pool().await?;
    registry::archive(&master, company.id).await?;

    let err = try_login(&env, "ghost", "password").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    Ok(())
}
