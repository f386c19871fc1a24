#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;

use parish_giving::database::GivingRepository;
use parish_giving::errors::{AppError, Result};
use parish_giving::middleware::auth::{issue_session, CSRF_HEADER};
use parish_giving::models::directory::{Campaign, Paybill};
use parish_giving::models::transaction::{
    GivingStatus, GivingTransaction, NewGiving, SettleOutcome, Settlement,
};
use parish_giving::services::giving_service::GivingService;
use parish_giving::services::mpesa_service::{
    MpesaGateway, StkPushParams, StkPushResponse, StkQueryResponse,
};
use parish_giving::state::AppState;

pub const JWT_SECRET: &str = "integration-secret";
pub const MEMBER_ID: i64 = 42;
pub const PARISH_ID: i64 = 1;
pub const PAYBILL_ID: i64 = 1;
pub const CAMPAIGN_ID: i64 = 9;

#[derive(Default)]
struct Store {
    givings: Vec<GivingTransaction>,
    campaigns: Vec<Campaign>,
}

/// Keeps everything in memory and applies the same pending-only settle rule
/// as the Postgres repository.
pub struct MemoryRepository {
    store: Mutex<Store>,
    paybills: Vec<Paybill>,
    pub fail_inserts: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        let campaign = Campaign {
            id: CAMPAIGN_ID,
            parish_id: PARISH_ID,
            title: "Roof Fund".into(),
            target_amount: 1_000_000,
            raised_amount: 0,
            is_active: true,
            created_at: Utc::now(),
        };
        MemoryRepository {
            store: Mutex::new(Store {
                givings: Vec::new(),
                campaigns: vec![campaign],
            }),
            paybills: vec![
                Paybill {
                    id: PAYBILL_ID,
                    parish_id: PARISH_ID,
                    paybill_number: "174379".into(),
                    account_reference: "StMarys".into(),
                    description: Some("Tithes and offerings".into()),
                    is_active: true,
                },
                Paybill {
                    id: 2,
                    parish_id: PARISH_ID,
                    paybill_number: "600000".into(),
                    account_reference: "Closed".into(),
                    description: None,
                    is_active: false,
                },
            ],
            fail_inserts: false,
        }
    }

    pub fn failing() -> Self {
        MemoryRepository {
            fail_inserts: true,
            ..Self::new()
        }
    }

    pub fn givings(&self) -> Vec<GivingTransaction> {
        self.store.lock().unwrap().givings.clone()
    }

    pub fn campaign_total(&self, campaign_id: i64) -> i64 {
        self.store
            .lock()
            .unwrap()
            .campaigns
            .iter()
            .find(|c| c.id == campaign_id)
            .map(|c| c.raised_amount)
            .unwrap_or_default()
    }

    pub fn insert_giving(&self, member_id: i64, checkout: &str, amount: i64) {
        let mut store = self.store.lock().unwrap();
        let id = store.givings.len() as i64 + 1;
        store.givings.push(giving_row(
            id,
            &NewGiving {
                member_id,
                parish_id: PARISH_ID,
                paybill_id: PAYBILL_ID,
                campaign_id: None,
                amount,
                phone_number: "254712345678".into(),
                merchant_request_id: format!("merchant-{}", checkout),
                checkout_request_id: checkout.into(),
            },
        ));
    }
}

fn giving_row(id: i64, new: &NewGiving) -> GivingTransaction {
    let now = Utc::now();
    GivingTransaction {
        id,
        member_id: new.member_id,
        parish_id: new.parish_id,
        paybill_id: new.paybill_id,
        campaign_id: new.campaign_id,
        amount: new.amount,
        method: "mpesa".into(),
        status: GivingStatus::Pending,
        phone_number: new.phone_number.clone(),
        merchant_request_id: new.merchant_request_id.clone(),
        checkout_request_id: new.checkout_request_id.clone(),
        receipt_number: None,
        result_desc: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}

#[async_trait]
impl GivingRepository for MemoryRepository {
    async fn find_paybill(&self, paybill_id: i64) -> Result<Option<Paybill>> {
        Ok(self.paybills.iter().find(|p| p.id == paybill_id).cloned())
    }

    async fn find_campaign(&self, campaign_id: i64) -> Result<Option<Campaign>> {
        let store = self.store.lock().unwrap();
        Ok(store.campaigns.iter().find(|c| c.id == campaign_id).cloned())
    }

    async fn record_pending(&self, giving: &NewGiving) -> Result<GivingTransaction> {
        if self.fail_inserts {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut store = self.store.lock().unwrap();
        let row = giving_row(store.givings.len() as i64 + 1, giving);
        store.givings.push(row.clone());
        Ok(row)
    }

    async fn find_by_checkout(&self, checkout: &str) -> Result<Option<GivingTransaction>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .givings
            .iter()
            .find(|g| g.checkout_request_id == checkout)
            .cloned())
    }

    async fn settle(&self, settlement: &Settlement) -> Result<SettleOutcome> {
        let mut store = self.store.lock().unwrap();
        let Some(index) = store.givings.iter().position(|g| {
            g.checkout_request_id == settlement.checkout_request_id
                || g.merchant_request_id == settlement.merchant_request_id
        }) else {
            return Ok(SettleOutcome::Unmatched);
        };

        if store.givings[index].status != GivingStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled(store.givings[index].clone()));
        }

        let giving = &mut store.givings[index];
        giving.status = settlement.status;
        giving.receipt_number = settlement.receipt_number.clone();
        giving.result_desc = Some(settlement.result_desc.clone());
        giving.updated_at = Utc::now();
        if settlement.status == GivingStatus::Completed {
            giving.completed_at = Some(Utc::now());
        }
        let giving = giving.clone();

        let mut campaign_credited = None;
        if settlement.status == GivingStatus::Completed {
            if let Some(campaign_id) = giving.campaign_id {
                if let Some(campaign) = store.campaigns.iter_mut().find(|c| c.id == campaign_id) {
                    campaign.raised_amount += giving.amount;
                    campaign_credited = Some(campaign_id);
                }
            }
        }

        Ok(SettleOutcome::Settled {
            giving,
            campaign_credited,
        })
    }

    async fn list_for_member(&self, member_id: i64, limit: i64) -> Result<Vec<GivingTransaction>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .givings
            .iter()
            .rev()
            .filter(|g| g.member_id == member_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Copy, PartialEq)]
pub enum GatewayMode {
    Accept,
    Reject,
}

/// Records every push and answers with predictable correlation ids.
pub struct FakeGateway {
    mode: GatewayMode,
    pushes: Mutex<Vec<StkPushParams>>,
    pub query_result: Option<String>,
}

impl FakeGateway {
    pub fn new(mode: GatewayMode) -> Self {
        FakeGateway {
            mode,
            pushes: Mutex::new(Vec::new()),
            query_result: None,
        }
    }

    pub fn pushes(&self) -> Vec<StkPushParams> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MpesaGateway for FakeGateway {
    async fn stk_push(&self, params: &StkPushParams) -> Result<StkPushResponse> {
        let mut pushes = self.pushes.lock().unwrap();
        pushes.push(params.clone());

        if self.mode == GatewayMode::Reject {
            return Err(AppError::mpesa("Bad Request - Invalid PhoneNumber"));
        }

        let n = pushes.len();
        Ok(StkPushResponse {
            merchant_request_id: format!("29115-34620561-{}", n),
            checkout_request_id: format!("ws_CO_TEST_{}", n),
            response_code: "0".into(),
            response_description: "Success. Request accepted for processing".into(),
            customer_message: "Success. Request accepted for processing".into(),
        })
    }

    async fn stk_query(&self, _checkout_request_id: &str) -> Result<StkQueryResponse> {
        Ok(StkQueryResponse {
            response_code: "0".into(),
            result_code: None,
            result_desc: self.query_result.clone(),
        })
    }
}

pub fn app_state(repository: Arc<MemoryRepository>, gateway: Option<Arc<FakeGateway>>) -> AppState {
    let db = PgPoolOptions::new()
        .connect_lazy("postgres://postgres@localhost/parish_giving_unused")
        .expect("lazy pool");

    let gateway: Option<Arc<dyn MpesaGateway>> = gateway.map(|g| g as Arc<dyn MpesaGateway>);
    AppState {
        db,
        giving: GivingService::new(repository, gateway, 10),
        jwt_secret: Arc::from(JWT_SECRET),
        session_ttl_hours: 1,
        cors_origins: Arc::from(Vec::<String>::new()),
    }
}

/// A request carrying a valid session cookie and matching CSRF header.
pub fn authed(method: &str, uri: &str, member_id: i64, body: Option<Value>) -> Request<Body> {
    let session = issue_session(JWT_SECRET, member_id, PARISH_ID, 1).expect("session");
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("session={}", session.token))
        .header(CSRF_HEADER, session.csrf_token);

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub fn callback_request(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/giving/mpesa/callback")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .expect("request")
}

pub fn callback_body(checkout: &str, merchant: &str, result_code: i64, receipt: Option<&str>) -> String {
    let metadata = match receipt {
        Some(receipt) => format!(
            r#","CallbackMetadata": {{"Item": [
                {{"Name": "Amount", "Value": 500}},
                {{"Name": "MpesaReceiptNumber", "Value": "{}"}},
                {{"Name": "TransactionDate", "Value": 20261018101500}},
                {{"Name": "PhoneNumber", "Value": 254712345678}}
            ]}}"#,
            receipt
        ),
        None => String::new(),
    };
    format!(
        r#"{{"Body": {{"stkCallback": {{
            "MerchantRequestID": "{}",
            "CheckoutRequestID": "{}",
            "ResultCode": {},
            "ResultDesc": "{}"{}
        }}}}}}"#,
        merchant,
        checkout,
        result_code,
        if result_code == 0 { "The service request is processed successfully." } else { "Request cancelled by user" },
        metadata
    )
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
