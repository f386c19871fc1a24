use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::user::Claims;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Who is calling, resolved once per request and handed to handlers
/// explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub member_id: i64,
    pub parish_id: i64,
    pub csrf_token: String,
}

pub struct IssuedSession {
    pub token: String,
    pub csrf_token: String,
}

pub fn issue_session(
    secret: &str,
    member_id: i64,
    parish_id: i64,
    ttl_hours: i64,
) -> Result<IssuedSession> {
    let csrf_token = Uuid::new_v4().simple().to_string();
    let claims = Claims {
        sub: member_id,
        parish_id,
        csrf: csrf_token.clone(),
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(IssuedSession { token, csrf_token })
}

pub fn session_cookie(token: &str, ttl_hours: i64) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_hours * 3600
    ))
    .map_err(|e| AppError::service(format!("invalid session cookie: {}", e)))
}

pub fn cleared_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    })
}

/// Decodes the session and checks the CSRF header against it.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<RequestContext> {
    let token = session_token(headers).ok_or(AppError::AuthError)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    let claims = token_data.claims;

    let presented = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::CsrfMismatch)?;
    if presented != claims.csrf {
        return Err(AppError::CsrfMismatch);
    }

    Ok(RequestContext {
        member_id: claims.sub,
        parish_id: claims.parish_id,
        csrf_token: claims.csrf,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        authenticate(&parts.headers, &state.jwt_secret).map_err(|e| {
            tracing::warn!("Rejected {} {}: {}", parts.method, parts.uri.path(), e);
            e
        })
    }
}
