// models/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "giving_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GivingStatus {
    Pending,
    Completed,
    Failed,
}

impl GivingStatus {
    /// Daraja reports `ResultCode == 0` for a paid prompt; every other code
    /// (cancelled, timed out, insufficient funds, ...) is a failure.
    pub fn from_result_code(result_code: i64) -> Self {
        if result_code == 0 {
            GivingStatus::Completed
        } else {
            GivingStatus::Failed
        }
    }

    pub fn is_final(self) -> bool {
        !matches!(self, GivingStatus::Pending)
    }

    /// Client-facing label used by the status endpoint.
    pub fn as_client_status(self) -> &'static str {
        match self {
            GivingStatus::Pending => "pending",
            GivingStatus::Completed => "success",
            GivingStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GivingTransaction {
    pub id: i64,
    pub member_id: i64,
    pub parish_id: i64,
    pub paybill_id: i64,
    pub campaign_id: Option<i64>,
    pub amount: i64,
    pub method: String,
    pub status: GivingStatus,
    pub phone_number: String,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub receipt_number: Option<String>,
    pub result_desc: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Everything needed to record an accepted STK push.
#[derive(Debug, Clone)]
pub struct NewGiving {
    pub member_id: i64,
    pub parish_id: i64,
    pub paybill_id: i64,
    pub campaign_id: Option<i64>,
    pub amount: i64,
    pub phone_number: String,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
}

/// Outcome reported by the gateway callback for one checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub status: GivingStatus,
    pub result_code: i64,
    pub result_desc: String,
    pub receipt_number: Option<String>,
    pub phone_number: Option<String>,
    pub transaction_date: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// The row moved out of `pending`. `campaign_credited` names the campaign
    /// whose total was increased, if any.
    Settled {
        giving: GivingTransaction,
        campaign_credited: Option<i64>,
    },
    /// The row had already left `pending`; nothing was written.
    AlreadySettled(GivingTransaction),
    Unmatched,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_code_zero_completes() {
        assert_eq!(GivingStatus::from_result_code(0), GivingStatus::Completed);
        assert_eq!(GivingStatus::from_result_code(1032), GivingStatus::Failed);
        assert_eq!(GivingStatus::from_result_code(1), GivingStatus::Failed);
    }

    #[test]
    fn only_pending_is_open() {
        assert!(!GivingStatus::Pending.is_final());
        assert!(GivingStatus::Completed.is_final());
        assert!(GivingStatus::Failed.is_final());
        assert_eq!(GivingStatus::Completed.as_client_status(), "success");
    }
}
