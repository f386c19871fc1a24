use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Diocese {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Parish {
    pub id: i64,
    pub diocese_id: i64,
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParishQuery {
    pub diocese_id: Option<i64>,
}

/// Destination account on the mobile-money network, one per parish/purpose.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Paybill {
    pub id: i64,
    pub parish_id: i64,
    pub paybill_number: String,
    pub account_reference: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,
    pub parish_id: i64,
    pub title: String,
    pub target_amount: i64,
    pub raised_amount: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CampaignSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub campaign: Campaign,
    pub donation_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CampaignQuery {
    pub parish_id: Option<i64>,
}
