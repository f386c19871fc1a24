// handlers/mpesa_handlers.rs
use axum::{
    body::Bytes,
    extract::State,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::errors::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::auth::RequestContext;
use crate::models::payment::{
    GivingStatusResponse, HistoryQuery, InitiateGiving, InitiateGivingResponse,
};
use crate::models::transaction::GivingTransaction;
use crate::state::AppState;

pub async fn initiate_giving(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(request): ApiJson<InitiateGiving>,
) -> Result<Json<InitiateGivingResponse>> {
    info!(
        "Giving requested by member {}: KES {} to paybill {}",
        ctx.member_id, request.amount, request.paybill_id
    );

    let response = state.giving.initiate(&ctx, request).await?;
    Ok(Json(response))
}

/// Daraja posts here. The body is taken raw so that even unparseable
/// payloads get the acknowledgement; otherwise the gateway keeps retrying.
pub async fn mpesa_callback(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    state.giving.reconcile(&body).await;

    Json(json!({
        "ResultCode": 0,
        "ResultDesc": "Success"
    }))
}

pub async fn check_transaction_status(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiPath(checkout_request_id): ApiPath<String>,
) -> Result<Json<GivingStatusResponse>> {
    let status = state.giving.status(&ctx, &checkout_request_id).await?;
    Ok(Json(status))
}

pub async fn giving_history(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<GivingTransaction>>> {
    let givings = state.giving.history(&ctx, query.clamped_limit()).await?;
    Ok(Json(givings))
}
