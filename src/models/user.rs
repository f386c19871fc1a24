use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Member {
    pub id: i64,
    pub parish_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LoginWithPhone {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: i64,
    pub parish_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl From<&Member> for MemberResponse {
    fn from(member: &Member) -> Self {
        MemberResponse {
            id: member.id,
            parish_id: member.parish_id,
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            phone: member.phone.clone(),
            email: member.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub member: MemberResponse,
    pub csrf_token: String,
}

/// Session token claims. `csrf` is echoed back by the client in the
/// `X-CSRF-Token` header on every authenticated request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub parish_id: i64,
    pub csrf: String,
    pub exp: usize,
}
