use axum::{
    extract::State,
    response::Json,
};

use crate::errors::{AppError, Result};
use crate::extract::{ApiPath, ApiQuery};
use crate::models::directory::{
    CampaignQuery, CampaignSummary, Diocese, Parish, ParishQuery, Paybill,
};
use crate::state::AppState;

const CAMPAIGN_SUMMARY: &str = r#"
    SELECT c.id, c.parish_id, c.title, c.target_amount, c.raised_amount, c.is_active,
           c.created_at, COUNT(g.id) AS donation_count
    FROM campaigns c
    LEFT JOIN campaign_donations cd ON cd.campaign_id = c.id
    LEFT JOIN giving_transactions g ON g.id = cd.giving_id AND g.status = 'completed'
"#;

pub async fn list_dioceses(State(state): State<AppState>) -> Result<Json<Vec<Diocese>>> {
    let dioceses = sqlx::query_as::<_, Diocese>("SELECT id, name FROM dioceses ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(dioceses))
}

pub async fn list_parishes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ParishQuery>,
) -> Result<Json<Vec<Parish>>> {
    let parishes = sqlx::query_as::<_, Parish>(
        "SELECT id, diocese_id, name, location FROM parishes
         WHERE ($1::BIGINT IS NULL OR diocese_id = $1)
         ORDER BY name",
    )
    .bind(query.diocese_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(parishes))
}

/// Active paybills a member can give to at one parish.
pub async fn list_paybills(
    State(state): State<AppState>,
    ApiPath(parish_id): ApiPath<i64>,
) -> Result<Json<Vec<Paybill>>> {
    let paybills = sqlx::query_as::<_, Paybill>(
        "SELECT id, parish_id, paybill_number, account_reference, description, is_active
         FROM paybills WHERE parish_id = $1 AND is_active
         ORDER BY id",
    )
    .bind(parish_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(paybills))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CampaignQuery>,
) -> Result<Json<Vec<CampaignSummary>>> {
    let campaigns = sqlx::query_as::<_, CampaignSummary>(&format!(
        "{} WHERE c.is_active AND ($1::BIGINT IS NULL OR c.parish_id = $1)
         GROUP BY c.id
         ORDER BY c.created_at DESC",
        CAMPAIGN_SUMMARY
    ))
    .bind(query.parish_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(campaigns))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<CampaignSummary>> {
    let campaign = sqlx::query_as::<_, CampaignSummary>(&format!(
        "{} WHERE c.id = $1 GROUP BY c.id",
        CAMPAIGN_SUMMARY
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Campaign"))?;
    Ok(Json(campaign))
}
