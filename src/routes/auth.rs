use axum::{routing::post, Router};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(crate::handlers::auth::login_with_phone))
        .route("/logout", post(crate::handlers::auth::logout))
}
