use axum::{extract::State, response::Json};
use tracing::info;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::extract::ApiJson;
use crate::middleware::auth::RequestContext;
use crate::models::user::{Member, MemberResponse};
use crate::models::user_profile::{MinistryAssignment, UpdateMemberProfile, UpdateMinistries};
use crate::state::AppState;

const MEMBER_COLUMNS: &str = "id, parish_id, first_name, last_name, phone, email, password_hash, created_at, updated_at";

pub async fn get_my_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<MemberResponse>> {
    let member = sqlx::query_as::<_, Member>(&format!(
        "SELECT {} FROM members WHERE id = $1",
        MEMBER_COLUMNS
    ))
    .bind(ctx.member_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Member"))?;

    Ok(Json(MemberResponse::from(&member)))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(payload): ApiJson<UpdateMemberProfile>,
) -> Result<Json<MemberResponse>> {
    payload.validate()?;

    let member = sqlx::query_as::<_, Member>(&format!(
        "UPDATE members
         SET first_name = $1, last_name = $2, email = $3, updated_at = now()
         WHERE id = $4
         RETURNING {}",
        MEMBER_COLUMNS
    ))
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.as_deref().map(str::trim))
    .bind(ctx.member_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Member"))?;

    info!("Member {} updated their profile", member.id);
    Ok(Json(MemberResponse::from(&member)))
}

async fn load_ministries(state: &AppState, member_id: i64) -> Result<Vec<MinistryAssignment>> {
    let ministries = sqlx::query_as::<_, MinistryAssignment>(
        "SELECT mm.ministry_id, m.name AS ministry_name, mm.role, mm.assigned_at
         FROM member_ministries mm
         JOIN ministries m ON m.id = mm.ministry_id
         WHERE mm.member_id = $1
         ORDER BY m.name",
    )
    .bind(member_id)
    .fetch_all(&state.db)
    .await?;
    Ok(ministries)
}

pub async fn get_my_ministries(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<MinistryAssignment>>> {
    Ok(Json(load_ministries(&state, ctx.member_id).await?))
}

/// Replaces the member's ministry list: delete everything, reinsert the
/// submitted set, all in one transaction.
pub async fn replace_my_ministries(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(payload): ApiJson<UpdateMinistries>,
) -> Result<Json<Vec<MinistryAssignment>>> {
    payload.validate()?;
    payload.check_unique().map_err(AppError::invalid_data)?;

    let mut tx = state.db.begin().await?;

    sqlx::query("DELETE FROM member_ministries WHERE member_id = $1")
        .bind(ctx.member_id)
        .execute(&mut *tx)
        .await?;

    for entry in &payload.ministries {
        let inserted = sqlx::query(
            "INSERT INTO member_ministries (member_id, ministry_id, role)
             SELECT $1, id, $3 FROM ministries WHERE id = $2",
        )
        .bind(ctx.member_id)
        .bind(entry.ministry_id)
        .bind(entry.role.as_deref())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(AppError::invalid_data(format!(
                "Unknown ministry {}",
                entry.ministry_id
            )));
        }
    }

    tx.commit().await?;
    info!(
        "Member {} now serves in {} ministries",
        ctx.member_id,
        payload.ministries.len()
    );

    Ok(Json(load_ministries(&state, ctx.member_id).await?))
}
