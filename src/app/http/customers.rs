use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{CreateCustomerRequest, CustomerQuery, UpdateTierRequest};
use crate::domain::customer::Customer;
use crate::importer::CustomerImportReport;

use super::common::{ApiJson, ApiPath, ApiQuery, blocking, HttpResult, Session, SharedState};

// ==========================================
// 客户相关路由
// ==========================================

/// GET /customers
pub(crate) async fn list_customers(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<CustomerQuery>,
) -> HttpResult<Json<Vec<Customer>>> {
    let result = blocking(move || state.customer_api.list_customers(&ctx, query)).await?;
    Ok(Json(result))
}

/// POST /customers
pub(crate) async fn create_customer(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiJson(req): ApiJson<CreateCustomerRequest>,
) -> HttpResult<(StatusCode, Json<Customer>)> {
    let customer = blocking(move || state.customer_api.create_customer(&ctx, req)).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /customers/:id
pub(crate) async fn get_customer(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(id): ApiPath<i64>,
) -> HttpResult<Json<Customer>> {
    let result = blocking(move || state.customer_api.get_customer(&ctx, id)).await?;
    Ok(Json(result))
}

/// PUT /customers/:id/tier
pub(crate) async fn update_tier(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateTierRequest>,
) -> HttpResult<Json<Customer>> {
    let result = blocking(move || state.customer_api.update_tier(&ctx, id, req)).await?;
    Ok(Json(result))
}

/// POST /customers/import（请求体为 CSV 文本）
pub(crate) async fn import_customers(
    State(state): State<SharedState>,
    Session(ctx): Session,
    body: Bytes,
) -> HttpResult<Json<CustomerImportReport>> {
    let result = blocking(move || state.customer_api.import_csv(&ctx, &body)).await?;
    Ok(Json(result))
}
