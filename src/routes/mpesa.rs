use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::mpesa_handlers;
use crate::state::AppState;

pub fn giving_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(giving_health))
        .route("/history", get(mpesa_handlers::giving_history))
        // STK push round trip
        .route("/mpesa/initiate", post(mpesa_handlers::initiate_giving))
        .route("/mpesa/callback", post(mpesa_handlers::mpesa_callback))
        .route(
            "/mpesa/status/:checkout_request_id",
            get(mpesa_handlers::check_transaction_status),
        )
}

async fn giving_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "giving",
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["stk-push", "callback", "status", "history"]
    }))
}
