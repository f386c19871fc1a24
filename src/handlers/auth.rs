use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::Json,
};
use bcrypt::verify;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::extract::ApiJson;
use crate::middleware::auth::{cleared_session_cookie, issue_session, session_cookie};
use crate::models::user::{AuthResponse, LoginWithPhone, Member, MemberResponse};
use crate::services::phone::normalize_phone;
use crate::state::AppState;

pub async fn login_with_phone(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginWithPhone>,
) -> Result<(HeaderMap, Json<AuthResponse>)> {
    // Unparseable numbers get the same answer as a wrong password.
    let phone = normalize_phone(&payload.phone).map_err(|_| AppError::InvalidCredentials)?;

    let member = sqlx::query_as::<_, Member>(
        "SELECT id, parish_id, first_name, last_name, phone, email, password_hash,
                created_at, updated_at
         FROM members WHERE phone = $1",
    )
    .bind(&phone)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    if !verify(&payload.password, &member.password_hash)? {
        warn!("Failed login for member {}", member.id);
        return Err(AppError::InvalidCredentials);
    }

    let session = issue_session(
        &state.jwt_secret,
        member.id,
        member.parish_id,
        state.session_ttl_hours,
    )?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&session.token, state.session_ttl_hours)?,
    );

    info!("Member {} signed in", member.id);
    Ok((
        headers,
        Json(AuthResponse {
            success: true,
            member: MemberResponse::from(&member),
            csrf_token: session.csrf_token,
        }),
    ))
}

pub async fn logout() -> (HeaderMap, Json<Value>) {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cleared_session_cookie());
    (headers, Json(json!({ "success": true })))
}
