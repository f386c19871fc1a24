// services/mpesa_service.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::MpesaConfig;
use crate::errors::{AppError, Result};

// Daraja limits these two fields; longer values get the request rejected.
const ACCOUNT_REFERENCE_MAX: usize = 12;
const TRANSACTION_DESC_MAX: usize = 13;

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: i64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

#[derive(Debug, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode", default)]
    pub response_code: String,
    #[serde(rename = "ResultCode", default)]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
}

/// Daraja's error envelope for rejected requests.
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// What the giving flow asks the gateway to push to a payer's phone.
#[derive(Debug, Clone, PartialEq)]
pub struct StkPushParams {
    pub phone_number: String,
    pub amount: i64,
    pub account_reference: String,
    pub transaction_desc: String,
}

/// Outbound seam to the mobile-money gateway.
#[async_trait]
pub trait MpesaGateway: Send + Sync {
    async fn stk_push(&self, params: &StkPushParams) -> Result<StkPushResponse>;

    async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResponse>;
}

pub struct MpesaService {
    config: MpesaConfig,
    client: Client,
    cached_token: RwLock<Option<(String, DateTime<Utc>)>>,
}

impl MpesaService {
    pub fn new(config: MpesaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(MpesaService {
            config,
            client,
            cached_token: RwLock::new(None),
        })
    }

    fn timestamp() -> String {
        // Daraja validates the timestamp against Nairobi time (UTC+3).
        (Utc::now() + Duration::hours(3)).format("%Y%m%d%H%M%S").to_string()
    }

    /// Client-credential exchange. Tokens are reused until five minutes
    /// before Daraja says they expire.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some((token, expiry)) = cached.as_ref() {
                if *expiry > Utc::now() + Duration::minutes(5) {
                    return Ok(token.clone());
                }
            }
        }

        info!("Requesting new M-Pesa access token");
        let credentials = format!("{}:{}", self.config.consumer_key, self.config.consumer_secret);

        let response = self
            .client
            .get(self.config.auth_url())
            .header(header::AUTHORIZATION, format!("Basic {}", base64.encode(credentials)))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Failed to get access token: {} - {}", status, body);
            return Err(AppError::mpesa(format!("Authentication with M-Pesa failed ({})", status)));
        }

        let auth: AuthResponse = response.json().await?;
        let lifetime = auth
            .expires_in
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(3599);

        let mut cached = self.cached_token.write().await;
        *cached = Some((auth.access_token.clone(), Utc::now() + Duration::seconds(lifetime)));

        Ok(auth.access_token)
    }

    pub fn build_stk_request(&self, params: &StkPushParams, timestamp: String) -> StkPushRequest {
        StkPushRequest {
            business_short_code: self.config.short_code.clone(),
            password: generate_password(&self.config.short_code, &self.config.passkey, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: params.amount,
            party_a: params.phone_number.clone(),
            party_b: self.config.short_code.clone(),
            phone_number: params.phone_number.clone(),
            callback_url: self.config.callback_url.clone(),
            account_reference: truncate(&params.account_reference, ACCOUNT_REFERENCE_MAX),
            transaction_desc: truncate(&params.transaction_desc, TRANSACTION_DESC_MAX),
        }
    }

    async fn rejected(response: Response, what: &str) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("{} failed: {} - {}", what, status, body);

        let message = serde_json::from_str::<GatewayErrorBody>(&body)
            .ok()
            .and_then(|b| b.error_message)
            .unwrap_or_else(|| format!("{} failed ({})", what, status));
        AppError::mpesa(message)
    }
}

#[async_trait]
impl MpesaGateway for MpesaService {
    async fn stk_push(&self, params: &StkPushParams) -> Result<StkPushResponse> {
        info!("STK push for {} - KES {}", params.phone_number, params.amount);

        let access_token = self.get_access_token().await?;
        let request = self.build_stk_request(params, Self::timestamp());

        let response = self
            .client
            .post(self.config.stk_push_url())
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response, "STK push").await);
        }

        let stk_response: StkPushResponse = response.json().await?;
        if stk_response.response_code != "0" {
            error!(
                "STK push not accepted: {} - {}",
                stk_response.response_code, stk_response.response_description
            );
            return Err(AppError::mpesa(stk_response.response_description));
        }

        info!(
            "STK push accepted: merchant={} checkout={}",
            stk_response.merchant_request_id, stk_response.checkout_request_id
        );
        Ok(stk_response)
    }

    async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResponse> {
        let access_token = self.get_access_token().await?;
        let timestamp = Self::timestamp();

        let request = StkQueryRequest {
            business_short_code: self.config.short_code.clone(),
            password: generate_password(&self.config.short_code, &self.config.passkey, &timestamp),
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let response = self
            .client
            .post(self.config.stk_query_url())
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response, "STK query").await);
        }

        Ok(response.json().await?)
    }
}

/// `base64(shortcode ‖ passkey ‖ timestamp)` as Daraja expects.
pub fn generate_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    base64.encode(format!("{}{}{}", short_code, passkey, timestamp))
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
