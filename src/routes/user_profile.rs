use axum::{routing::get, Router};

use crate::handlers::user_profile::{
    get_my_ministries, get_my_profile, replace_my_ministries, update_my_profile,
};
use crate::state::AppState;

pub fn user_profile_routes() -> Router<AppState> {
    Router::new()
        // GET/PUT /api/members/me
        .route("/me", get(get_my_profile).put(update_my_profile))
        // GET/PUT /api/members/me/ministries - PUT replaces the whole list
        .route("/me/ministries", get(get_my_ministries).put(replace_my_ministries))
}
