use serde::Deserialize;

use crate::models::transaction::{GivingStatus, Settlement};

#[derive(Debug, Deserialize)]
pub struct CallbackData {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    // `Balance` arrives without a value.
    #[serde(rename = "Value", default)]
    pub value: serde_json::Value,
}

impl StkCallback {
    /// Looks up a metadata item and renders it as text. Receipt numbers come
    /// as strings, phone numbers and dates as bare JSON numbers.
    pub fn metadata_value(&self, name: &str) -> Option<String> {
        let item = self
            .callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?;

        match &item.value {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn into_settlement(self) -> Settlement {
        let receipt_number = self.metadata_value("MpesaReceiptNumber");
        let phone_number = self.metadata_value("PhoneNumber");
        let transaction_date = self.metadata_value("TransactionDate");

        Settlement {
            status: GivingStatus::from_result_code(self.result_code),
            result_code: self.result_code,
            merchant_request_id: self.merchant_request_id,
            checkout_request_id: self.checkout_request_id,
            result_desc: self.result_desc,
            receipt_number,
            phone_number,
            transaction_date,
        }
    }
}

impl CallbackData {
    pub fn parse(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }
}
