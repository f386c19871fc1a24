//! The M-Pesa giving round trip: initiation, callback reconciliation and
//! status polling.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::database::GivingRepository;
use crate::errors::{AppError, Result};
use crate::middleware::auth::RequestContext;
use crate::models::mpesa_transactions::CallbackData;
use crate::models::payment::{GivingStatusResponse, InitiateGiving, InitiateGivingResponse};
use crate::models::transaction::{GivingTransaction, NewGiving, SettleOutcome};
use crate::services::mpesa_service::{MpesaGateway, StkPushParams};
use crate::services::phone::normalize_phone;

#[derive(Clone)]
pub struct GivingService {
    repository: Arc<dyn GivingRepository>,
    gateway: Option<Arc<dyn MpesaGateway>>,
    min_amount: i64,
}

/// Input that passed local validation and is ready for the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedGiving {
    pub amount: i64,
    pub phone_number: String,
}

impl GivingService {
    pub fn new(
        repository: Arc<dyn GivingRepository>,
        gateway: Option<Arc<dyn MpesaGateway>>,
        min_amount: i64,
    ) -> Self {
        GivingService {
            repository,
            gateway,
            min_amount,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn MpesaGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn gateway_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Checks amount then phone. Runs before anything leaves the process.
    pub fn validate(&self, request: &InitiateGiving) -> Result<ValidatedGiving> {
        if !request.amount.is_finite() || request.amount < self.min_amount as f64 {
            return Err(AppError::invalid_data(format!(
                "Amount must be at least KES {}",
                self.min_amount
            )));
        }
        if request.amount.fract() != 0.0 || request.amount >= i64::MAX as f64 {
            return Err(AppError::invalid_data("Amount must be a whole number of shillings"));
        }

        Ok(ValidatedGiving {
            amount: request.amount as i64,
            phone_number: normalize_phone(&request.phone_number)?,
        })
    }

    pub async fn initiate(
        &self,
        ctx: &RequestContext,
        request: InitiateGiving,
    ) -> Result<InitiateGivingResponse> {
        let validated = self.validate(&request)?;

        let paybill = self
            .repository
            .find_paybill(request.paybill_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::invalid_data("Select a valid paybill"))?;

        let campaign = match request.campaign_id {
            Some(id) => Some(
                self.repository
                    .find_campaign(id)
                    .await?
                    .filter(|c| c.is_active && c.parish_id == paybill.parish_id)
                    .ok_or_else(|| AppError::invalid_data("Select a valid campaign"))?,
            ),
            None => None,
        };

        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("M-Pesa giving is not available".into()))?;

        let params = StkPushParams {
            phone_number: validated.phone_number.clone(),
            amount: validated.amount,
            account_reference: paybill.account_reference.clone(),
            transaction_desc: campaign
                .as_ref()
                .map(|c| format!("Campaign: {}", c.title))
                .unwrap_or_else(|| "Offering".to_string()),
        };

        let accepted = gateway.stk_push(&params).await?;

        let new_giving = NewGiving {
            member_id: ctx.member_id,
            parish_id: paybill.parish_id,
            paybill_id: paybill.id,
            campaign_id: campaign.as_ref().map(|c| c.id),
            amount: validated.amount,
            phone_number: validated.phone_number,
            merchant_request_id: accepted.merchant_request_id.clone(),
            checkout_request_id: accepted.checkout_request_id.clone(),
        };

        // The prompt is already on the payer's phone at this point; a failed
        // insert leaves it orphaned on the gateway side.
        let giving = self.repository.record_pending(&new_giving).await.map_err(|e| {
            error!(
                "Giving not recorded after gateway accepted checkout {}: {}",
                accepted.checkout_request_id, e
            );
            e
        })?;

        info!(
            "Giving {} pending: member={} amount={} checkout={}",
            giving.id, ctx.member_id, giving.amount, giving.checkout_request_id
        );

        Ok(InitiateGivingResponse {
            success: true,
            giving_id: giving.id,
            merchant_request_id: accepted.merchant_request_id,
            checkout_request_id: accepted.checkout_request_id,
            customer_message: accepted.customer_message,
        })
    }

    /// Applies a raw callback body. Never fails: the gateway gets the same
    /// acknowledgement whatever happens here, so problems are only logged.
    pub async fn reconcile(&self, raw: &[u8]) -> Option<SettleOutcome> {
        let callback = match CallbackData::parse(raw) {
            Ok(callback) => callback,
            Err(e) => {
                warn!("Dropping malformed M-Pesa callback: {}", e);
                return None;
            }
        };

        let settlement = callback.body.stk_callback.into_settlement();
        info!(
            "M-Pesa callback: checkout={} result={} ({})",
            settlement.checkout_request_id, settlement.result_code, settlement.result_desc
        );

        match self.repository.settle(&settlement).await {
            Ok(SettleOutcome::Unmatched) => {
                warn!(
                    "No giving matches merchant={} checkout={}",
                    settlement.merchant_request_id, settlement.checkout_request_id
                );
                Some(SettleOutcome::Unmatched)
            }
            Ok(SettleOutcome::AlreadySettled(giving)) => {
                warn!(
                    "Ignoring repeated callback for giving {} (already {:?})",
                    giving.id, giving.status
                );
                Some(SettleOutcome::AlreadySettled(giving))
            }
            Ok(outcome @ SettleOutcome::Settled { .. }) => {
                if let SettleOutcome::Settled {
                    giving,
                    campaign_credited: Some(campaign_id),
                } = &outcome
                {
                    info!("Campaign {} credited KES {}", campaign_id, giving.amount);
                }
                Some(outcome)
            }
            Err(e) => {
                error!(
                    "Failed to apply callback for checkout {}: {}",
                    settlement.checkout_request_id, e
                );
                None
            }
        }
    }

    pub async fn status(
        &self,
        ctx: &RequestContext,
        checkout_request_id: &str,
    ) -> Result<GivingStatusResponse> {
        let giving = self
            .repository
            .find_by_checkout(checkout_request_id)
            .await?
            .filter(|g| g.member_id == ctx.member_id)
            .ok_or_else(|| AppError::not_found("Transaction"))?;

        let gateway_result = match &self.gateway {
            Some(gateway) if !giving.status.is_final() => {
                match gateway.stk_query(checkout_request_id).await {
                    Ok(query) => query.result_desc,
                    Err(e) => {
                        // Still answer from the local row.
                        warn!("STK query for {} failed: {}", checkout_request_id, e);
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(GivingStatusResponse::from_giving(&giving, gateway_result))
    }

    pub async fn history(&self, ctx: &RequestContext, limit: i64) -> Result<Vec<GivingTransaction>> {
        self.repository.list_for_member(ctx.member_id, limit).await
    }
}
