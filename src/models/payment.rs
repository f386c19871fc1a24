use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::transaction::GivingTransaction;

/// Body of `POST /api/giving/mpesa/initiate`.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateGiving {
    pub amount: f64,
    pub paybill_id: i64,
    pub phone_number: String,
    #[serde(default)]
    pub campaign_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiateGivingResponse {
    pub success: bool,
    pub giving_id: i64,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub customer_message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GivingStatusResponse {
    pub success: bool,
    pub status: &'static str,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub amount: i64,
    pub paybill_id: i64,
    pub campaign_id: Option<i64>,
    pub receipt_number: Option<String>,
    pub result_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GivingStatusResponse {
    pub fn from_giving(giving: &GivingTransaction, gateway_result: Option<String>) -> Self {
        GivingStatusResponse {
            success: true,
            status: giving.status.as_client_status(),
            checkout_request_id: giving.checkout_request_id.clone(),
            merchant_request_id: giving.merchant_request_id.clone(),
            amount: giving.amount,
            paybill_id: giving.paybill_id,
            campaign_id: giving.campaign_id,
            receipt_number: giving.receipt_number.clone(),
            result_desc: giving.result_desc.clone(),
            gateway_result,
            created_at: giving.created_at,
            completed_at: giving.completed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn clamped_limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}
