// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("M-Pesa error: {0}")]
    MpesaError(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Authentication required")]
    AuthError,

    #[error("Invalid CSRF token")]
    CsrfMismatch,

    #[error("Invalid phone number or password")]
    InvalidCredentials,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Service error: {0}")]
    ServiceError(String),
}

impl AppError {
    /// Stable machine-readable tag for the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Migration(_) => "database_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::MpesaError(_) | AppError::ExternalApi(_) => "gateway_error",
            AppError::AuthError | AppError::InvalidCredentials => "unauthorized",
            AppError::CsrfMismatch => "forbidden",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::ConfigurationError(_) | AppError::ServiceError(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MpesaError(_) | AppError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            AppError::AuthError | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::CsrfMismatch => StatusCode::FORBIDDEN,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigurationError(_) | AppError::ServiceError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            // Never echo SQL or driver details back to the client.
            AppError::Database(_) | AppError::Migration(_) => {
                "Could not save your request, please try again".to_string()
            }
            AppError::ConfigurationError(_) | AppError::ServiceError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} -> {}", status, self);
        }

        let body = Json(json!({
            "success": false,
            "error": self.kind(),
            "message": self.public_message(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::AuthError
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::ServiceError(format!("password hashing failed: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn mpesa(msg: impl Into<String>) -> Self {
        AppError::MpesaError(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    pub fn service(msg: impl Into<String>) -> Self {
        AppError::ServiceError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
