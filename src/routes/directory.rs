use axum::{routing::get, Router};

use crate::handlers::directory::{
    get_campaign, list_campaigns, list_dioceses, list_parishes, list_paybills,
};
use crate::state::AppState;

pub fn directory_routes() -> Router<AppState> {
    Router::new()
        .route("/dioceses", get(list_dioceses))
        // GET /api/parishes?diocese_id=3
        .route("/parishes", get(list_parishes))
        .route("/parishes/:id/paybills", get(list_paybills))
        // GET /api/campaigns?parish_id=12
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/:id", get(get_campaign))
}
