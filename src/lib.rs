//! Parish giving API: member sessions, parish directory data and M-Pesa
//! STK-push giving.

use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod database;
pub mod errors;
pub mod extract;
mod handlers;
pub mod middleware;
pub mod models;
mod routes;
pub mod services;
pub mod state;

use state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.cors_origins);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/auth", routes::auth::routes())
        .nest("/api/giving", routes::mpesa::giving_routes())
        .nest("/api/members", routes::user_profile::user_profile_routes())
        .nest("/api", routes::directory::directory_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// With configured origins the browser may send the session cookie. Without
/// them any origin is allowed but only Bearer tokens work cross-origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return base.allow_origin(Any).allow_headers(Any);
    }

    base.allow_origin(allowed)
        .allow_credentials(true)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(middleware::auth::CSRF_HEADER),
        ])
}

async fn root_handler() -> &'static str {
    "⛪ Parish Giving API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "mpesa": state.giving.gateway_enabled(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
