// config.rs
use std::env;
use std::time::Duration;

use crate::errors::{AppError, Result};

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub passkey: String,
    pub callback_url: String,
    pub environment: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl MpesaConfig {
    /// Reads the Daraja credentials. Returns `Ok(None)` when no consumer key is
    /// configured so the server can boot with giving disabled.
    pub fn from_env() -> Result<Option<Self>> {
        let consumer_key = match env::var("MPESA_CONSUMER_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return Ok(None),
        };

        let environment = env::var("MPESA_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string());

        let base_url = match env::var("MPESA_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ if environment == "production" => PRODUCTION_BASE_URL.to_string(),
            _ => SANDBOX_BASE_URL.to_string(),
        };

        Ok(Some(MpesaConfig {
            consumer_key,
            consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            short_code: required("MPESA_SHORT_CODE")?,
            passkey: required("MPESA_PASSKEY")?,
            callback_url: required("MPESA_CALLBACK_URL")?,
            environment,
            base_url,
            timeout: Duration::from_secs(parse_or("MPESA_TIMEOUT_SECS", 30)?),
        }))
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn auth_url(&self) -> String {
        format!("{}/oauth/v1/generate?grant_type=client_credentials", self.base_url)
    }

    pub fn stk_push_url(&self) -> String {
        format!("{}/mpesa/stkpush/v1/processrequest", self.base_url)
    }

    pub fn stk_query_url(&self) -> String {
        format!("{}/mpesa/stkpushquery/v1/query", self.base_url)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub min_giving_amount: i64,
    /// Browser origins allowed to call the API with the session cookie.
    pub cors_origins: Vec<String>,
    pub mpesa: Option<MpesaConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(AppConfig {
            database_url: required("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000)?,
            jwt_secret: required("JWT_SECRET")?,
            session_ttl_hours: parse_or("SESSION_TTL_HOURS", 12)?,
            min_giving_amount: parse_or("GIVING_MIN_AMOUNT", 10)?,
            cors_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
            mpesa: MpesaConfig::from_env()?,
        })
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "host": self.host,
            "port": self.port,
            "session_ttl_hours": self.session_ttl_hours,
            "min_giving_amount": self.min_giving_amount,
            "cors_origins": self.cors_origins,
            "mpesa_enabled": self.mpesa.is_some(),
            "mpesa_environment": self.mpesa.as_ref().map(|m| m.environment.clone()),
            "mpesa_production": self.mpesa.as_ref().map(MpesaConfig::is_production),
            "mpesa_short_code": self.mpesa.as_ref().map(|m| m.short_code.clone()),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::configuration(format!("{} must be set", key)))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::configuration(format!("{} must be a number", key))),
        Err(_) => Ok(default),
    }
}
