use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{CreateOrderRequest, OrderDetail, OrderQuery, UpdateOrderRequest};
use crate::domain::order::OrderView;

use super::common::{ApiJson, ApiPath, ApiQuery, blocking, HttpResult, Session, SharedState};

// ==========================================
// 订单相关路由
// ==========================================

/// POST /orders
///
/// 下单成功后异步发送下单确认（失败只记日志，不影响响应）
pub(crate) async fn create_order(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> HttpResult<(StatusCode, Json<OrderView>)> {
    let api = state.order_api.clone();
    let (view, customer) = blocking(move || api.create_order(&ctx, req)).await?;

    let notifier = state.notifier.clone();
    let order = view.order.clone();
    tokio::spawn(async move {
        let report = notifier.notify_order_created(&customer, &order).await;
        tracing::debug!(order_number = %order.order_number, sent = report.sent, "下单确认已发送");
    });

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /orders
pub(crate) async fn list_orders(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> HttpResult<Json<Vec<OrderView>>> {
    let result = blocking(move || state.order_api.list_orders(&ctx, query)).await?;
    Ok(Json(result))
}

/// GET /orders/:id
pub(crate) async fn get_order(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(id): ApiPath<i64>,
) -> HttpResult<Json<OrderDetail>> {
    let result = blocking(move || state.order_api.get_order(&ctx, id)).await?;
    Ok(Json(result))
}

/// PUT /orders/:id
pub(crate) async fn update_order(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateOrderRequest>,
) -> HttpResult<Json<OrderView>> {
    let result = blocking(move || state.order_api.update_order(&ctx, id, req)).await?;
    Ok(Json(result))
}

/// POST /orders/:id/cancel
pub(crate) async fn cancel_order(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(id): ApiPath<i64>,
) -> HttpResult<Json<OrderView>> {
    let result = blocking(move || state.order_api.cancel_order(&ctx, id)).await?;
    Ok(Json(result))
}
