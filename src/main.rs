use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{middleware as layers, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use rentora_api::config;
use rentora_api::handlers;
use rentora_api::middleware::{bind_tenant_middleware, jwt_auth_middleware};
use rentora_api::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up RENTORA_* settings
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config().clone();
    tracing::info!("Starting Rentora API in {:?} mode", config.environment);

    let state = AppState::initialize(config)
        .await
        .expect("failed to initialize databases");

    let app = app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("RENTORA_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("Rentora API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/login", post(handlers::auth::login))
        // Protected API, bound to the caller's company database per request
        .merge(api_routes(state.clone()))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // Company registry (super-admin)
        .route(
            "/api/companies",
            get(handlers::companies::list).post(handlers::companies::create),
        )
        .route(
            "/api/companies/:id",
            put(handlers::companies::update).delete(handlers::companies::delete),
        )
        .route("/api/companies/:id/archive", post(handlers::companies::archive))
        .route("/api/companies/:id/export", post(handlers::companies::export))
        // Payments and invoices
        .route(
            "/api/payments",
            get(handlers::payments::list).post(handlers::payments::create),
        )
        .route("/api/payments/:id/mark", post(handlers::payments::mark))
        .route(
            "/api/payments/:id/invoice",
            post(handlers::payments::generate_invoice),
        )
        // Expenses
        .route(
            "/api/expenses",
            get(handlers::expenses::list).post(handlers::expenses::create),
        )
        // Chart of accounts and reports
        .route(
            "/api/accounts",
            get(handlers::accounting::list_accounts).post(handlers::accounting::create_account),
        )
        .route(
            "/api/reports/ledger/:account_id",
            get(handlers::accounting::account_ledger),
        )
        .route(
            "/api/reports/trial-balance",
            get(handlers::accounting::trial_balance),
        )
        .route(
            "/api/reports/income-statement",
            get(handlers::accounting::income_statement),
        )
        .route(
            "/api/reports/balance-sheet",
            get(handlers::accounting::balance_sheet),
        )
        .route("/api/reports/reconcile", post(handlers::accounting::reconcile))
        // Innermost first: JWT auth runs before the tenant binder
        .layer(layers::from_fn_with_state(state.clone(), bind_tenant_middleware))
        .layer(layers::from_fn_with_state(state, jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Rentora API",
            "version": version,
            "description": "Multi-tenant property management backend (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/login (public - token acquisition)",
                "companies": "/api/companies[/:id] (super-admin)",
                "payments": "/api/payments[/:id/mark|/:id/invoice] (protected)",
                "expenses": "/api/expenses (protected)",
                "accounts": "/api/accounts (protected)",
                "reports": "/api/reports/* (protected)",
            }
        }
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
