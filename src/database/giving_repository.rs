//! Persistence for the giving flow.
//!
//! Every write here runs in a single database transaction. `settle` is the
//! only code that moves a giving out of `pending`, and it does so with a
//! conditional update so a replayed callback never touches the row (or the
//! campaign total) twice.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::errors::Result;
use crate::models::directory::{Campaign, Paybill};
use crate::models::transaction::{
    GivingStatus, GivingTransaction, NewGiving, SettleOutcome, Settlement,
};

#[async_trait]
pub trait GivingRepository: Send + Sync {
    async fn find_paybill(&self, paybill_id: i64) -> Result<Option<Paybill>>;

    async fn find_campaign(&self, campaign_id: i64) -> Result<Option<Campaign>>;

    /// Inserts the pending giving, its M-Pesa record and the optional campaign
    /// link atomically.
    async fn record_pending(&self, giving: &NewGiving) -> Result<GivingTransaction>;

    async fn find_by_checkout(&self, checkout_request_id: &str)
        -> Result<Option<GivingTransaction>>;

    async fn settle(&self, settlement: &Settlement) -> Result<SettleOutcome>;

    async fn list_for_member(&self, member_id: i64, limit: i64) -> Result<Vec<GivingTransaction>>;
}

const GIVING_SELECT: &str = r#"
    SELECT g.id, g.member_id, g.parish_id, g.paybill_id, cd.campaign_id, g.amount,
           g.method, g.status, g.phone_number, g.merchant_request_id,
           g.checkout_request_id, g.receipt_number, g.result_desc,
           g.created_at, g.updated_at, g.completed_at
    FROM giving_transactions g
    LEFT JOIN campaign_donations cd ON cd.giving_id = g.id
"#;

#[derive(Clone)]
pub struct PgGivingRepository {
    pool: PgPool,
}

impl PgGivingRepository {
    pub fn new(pool: PgPool) -> Self {
        PgGivingRepository { pool }
    }

    /// Reads the row back on the open transaction, so the caller only ever
    /// sees an error when nothing was committed.
    async fn fetch_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<GivingTransaction> {
        let giving = sqlx::query_as::<_, GivingTransaction>(&format!("{} WHERE g.id = $1", GIVING_SELECT))
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(giving)
    }

    async fn credit_campaign(
        tx: &mut Transaction<'_, Postgres>,
        giving_id: i64,
        amount: i64,
    ) -> Result<Option<i64>> {
        let campaign_id: Option<i64> =
            sqlx::query_scalar("SELECT campaign_id FROM campaign_donations WHERE giving_id = $1")
                .bind(giving_id)
                .fetch_optional(&mut **tx)
                .await?;

        if let Some(campaign_id) = campaign_id {
            sqlx::query("UPDATE campaigns SET raised_amount = raised_amount + $1 WHERE id = $2")
                .bind(amount)
                .bind(campaign_id)
                .execute(&mut **tx)
                .await?;
        }

        Ok(campaign_id)
    }
}

#[async_trait]
impl GivingRepository for PgGivingRepository {
    async fn find_paybill(&self, paybill_id: i64) -> Result<Option<Paybill>> {
        let paybill = sqlx::query_as::<_, Paybill>(
            "SELECT id, parish_id, paybill_number, account_reference, description, is_active
             FROM paybills WHERE id = $1",
        )
        .bind(paybill_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(paybill)
    }

    async fn find_campaign(&self, campaign_id: i64) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            "SELECT id, parish_id, title, target_amount, raised_amount, is_active, created_at
             FROM campaigns WHERE id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(campaign)
    }

    async fn record_pending(&self, giving: &NewGiving) -> Result<GivingTransaction> {
        let mut tx = self.pool.begin().await?;

        let giving_id: i64 = sqlx::query_scalar(
            "INSERT INTO giving_transactions
                (member_id, parish_id, paybill_id, amount, method, status, phone_number,
                 merchant_request_id, checkout_request_id)
             VALUES ($1, $2, $3, $4, 'mpesa', $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(giving.member_id)
        .bind(giving.parish_id)
        .bind(giving.paybill_id)
        .bind(giving.amount)
        .bind(GivingStatus::Pending)
        .bind(&giving.phone_number)
        .bind(&giving.merchant_request_id)
        .bind(&giving.checkout_request_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO mpesa_transactions
                (giving_id, phone_number, merchant_request_id, checkout_request_id)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(giving_id)
        .bind(&giving.phone_number)
        .bind(&giving.merchant_request_id)
        .bind(&giving.checkout_request_id)
        .execute(&mut *tx)
        .await?;

        if let Some(campaign_id) = giving.campaign_id {
            sqlx::query("INSERT INTO campaign_donations (giving_id, campaign_id) VALUES ($1, $2)")
                .bind(giving_id)
                .bind(campaign_id)
                .execute(&mut *tx)
                .await?;
        }

        let recorded = Self::fetch_in_tx(&mut tx, giving_id).await?;
        tx.commit().await?;
        Ok(recorded)
    }

    async fn find_by_checkout(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<GivingTransaction>> {
        let giving = sqlx::query_as::<_, GivingTransaction>(&format!(
            "{} WHERE g.checkout_request_id = $1",
            GIVING_SELECT
        ))
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(giving)
    }

    async fn settle(&self, settlement: &Settlement) -> Result<SettleOutcome> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so concurrent callbacks for one checkout serialize here.
        let target: Option<(i64, i64)> = sqlx::query_as(
            "SELECT id, amount FROM giving_transactions
             WHERE checkout_request_id = $1 OR merchant_request_id = $2
             ORDER BY (checkout_request_id = $1) DESC
             LIMIT 1
             FOR UPDATE",
        )
        .bind(&settlement.checkout_request_id)
        .bind(&settlement.merchant_request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((giving_id, amount)) = target else {
            return Ok(SettleOutcome::Unmatched);
        };

        let completed_at = (settlement.status == GivingStatus::Completed).then(Utc::now);
        let updated = sqlx::query(
            "UPDATE giving_transactions
             SET status = $1, receipt_number = $2, result_desc = $3,
                 completed_at = $4, updated_at = now()
             WHERE id = $5 AND status = 'pending'",
        )
        .bind(settlement.status)
        .bind(&settlement.receipt_number)
        .bind(&settlement.result_desc)
        .bind(completed_at)
        .bind(giving_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let settled = Self::fetch_in_tx(&mut tx, giving_id).await?;
            tx.rollback().await?;
            return Ok(SettleOutcome::AlreadySettled(settled));
        }

        sqlx::query(
            "UPDATE mpesa_transactions
             SET mpesa_receipt_number = $1, phone_number = COALESCE($2, phone_number),
                 transaction_date = $3, result_code = $4, updated_at = now()
             WHERE giving_id = $5",
        )
        .bind(&settlement.receipt_number)
        .bind(&settlement.phone_number)
        .bind(&settlement.transaction_date)
        .bind(settlement.result_code)
        .bind(giving_id)
        .execute(&mut *tx)
        .await?;

        let campaign_credited = if settlement.status == GivingStatus::Completed {
            Self::credit_campaign(&mut tx, giving_id, amount).await?
        } else {
            None
        };

        let giving = Self::fetch_in_tx(&mut tx, giving_id).await?;
        tx.commit().await?;
        info!("Giving {} settled as {:?}", giving_id, settlement.status);

        Ok(SettleOutcome::Settled {
            giving,
            campaign_credited,
        })
    }

    async fn list_for_member(&self, member_id: i64, limit: i64) -> Result<Vec<GivingTransaction>> {
        let givings = sqlx::query_as::<_, GivingTransaction>(&format!(
            "{} WHERE g.member_id = $1 ORDER BY g.created_at DESC, g.id DESC LIMIT $2",
            GIVING_SELECT
        ))
        .bind(member_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(givings)
    }
}
