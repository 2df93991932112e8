// ==========================================
// 雏鸡订单分配系统 - HTTP 路由（按域拆分）
// ==========================================
// 职责: REST 接口定义，连接 HTTP 客户端与业务 API
// 约定: 认证使用 Authorization: Bearer <token>；
//       错误响应体为 {"error": {"code", "message"}}
// ==========================================

mod allocations;
mod auth;
mod common;
mod customers;
mod inventory;
mod orders;
mod reports;

use axum::middleware::from_fn;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::state::AppState;

/// GET /healthz
async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": crate::APP_NAME,
        "version": crate::VERSION,
    }))
}

/// 构建完整路由
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        // 认证
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        // 看板与报表
        .route("/dashboard/stats", get(reports::dashboard_stats))
        .route("/reports/daily-summary", get(reports::daily_summary))
        .route("/reports/weekly-summary", get(reports::weekly_summary))
        .route("/reports/monthly-summary", get(reports::monthly_summary))
        .route("/reports/customer-analytics", get(reports::customer_analytics))
        .route("/reports/waitlist-analysis", get(reports::waitlist_analysis))
        // 订单
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/:id", get(orders::get_order).put(orders::update_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        // 客户
        .route(
            "/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route("/customers/import", post(customers::import_customers))
        .route("/customers/:id", get(customers::get_customer))
        .route("/customers/:id/tier", put(customers::update_tier))
        // 供给
        .route(
            "/inventory",
            get(inventory::list_supply).post(inventory::upsert_supply),
        )
        .route("/inventory/:date", get(inventory::get_supply))
        .route("/inventory/:date/confirm", post(inventory::confirm_supply))
        .route("/inventory/:date/override", post(inventory::override_supply))
        .route("/inventory/:date/audits", get(inventory::list_audits))
        // 分配
        .route("/allocations", get(allocations::list_allocations))
        .route("/allocations/run", post(allocations::run_allocation))
        .route("/allocations/dispatch-list", get(allocations::dispatch_list))
        .route("/allocations/:id/confirm-pickup", post(allocations::confirm_pickup))
        // 候补
        .route("/waitlist", get(allocations::list_waitlist))
        .route("/waitlist/process", post(allocations::process_waitlist))
        // 规则配置
        .route("/config", get(reports::list_configs))
        .route("/config/:key", put(reports::update_config))
        .layer(from_fn(common::request_tracing_middleware))
        .with_state(state)
}
