use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;

use crate::api::{ConfirmSupplyRequest, OverrideSupplyRequest, SupplyQuery, SupplyRequest};
use crate::domain::supply::{SupplyAudit, SupplyRecord};

use super::common::{ApiJson, ApiPath, ApiQuery, blocking, HttpResult, Session, SharedState};

// ==========================================
// 供给相关路由
// ==========================================

/// POST /inventory
pub(crate) async fn upsert_supply(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiJson(req): ApiJson<SupplyRequest>,
) -> HttpResult<Json<SupplyRecord>> {
    let result = blocking(move || state.inventory_api.upsert_supply(&ctx, req)).await?;
    Ok(Json(result))
}

/// GET /inventory
pub(crate) async fn list_supply(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<SupplyQuery>,
) -> HttpResult<Json<Vec<SupplyRecord>>> {
    let result = blocking(move || state.inventory_api.list_supply(&ctx, query)).await?;
    Ok(Json(result))
}

/// GET /inventory/:date
pub(crate) async fn get_supply(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(date): ApiPath<NaiveDate>,
) -> HttpResult<Json<SupplyRecord>> {
    let result = blocking(move || state.inventory_api.get_supply(&ctx, date)).await?;
    Ok(Json(result))
}

/// POST /inventory/:date/confirm
pub(crate) async fn confirm_supply(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(date): ApiPath<NaiveDate>,
    ApiJson(req): ApiJson<ConfirmSupplyRequest>,
) -> HttpResult<Json<SupplyRecord>> {
    let result = blocking(move || state.inventory_api.confirm_supply(&ctx, date, req)).await?;
    Ok(Json(result))
}

/// POST /inventory/:date/override
pub(crate) async fn override_supply(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(date): ApiPath<NaiveDate>,
    ApiJson(req): ApiJson<OverrideSupplyRequest>,
) -> HttpResult<Json<SupplyRecord>> {
    let result = blocking(move || state.inventory_api.override_supply(&ctx, date, req)).await?;
    Ok(Json(result))
}

/// GET /inventory/:date/audits
pub(crate) async fn list_audits(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(date): ApiPath<NaiveDate>,
) -> HttpResult<Json<Vec<SupplyAudit>>> {
    let result = blocking(move || state.inventory_api.list_audits(&ctx, date)).await?;
    Ok(Json(result))
}
