use axum::extract::State;
use axum::Json;

use crate::api::{ReportQuery, UpdateConfigRequest};
use crate::config::ConfigItem;
use crate::engine::{
    CustomerAnalytics, DailySummary, DashboardStats, MonthlySummary, WaitlistAnalysis,
    WeeklySummary,
};

use super::common::{ApiJson, ApiPath, ApiQuery, blocking, HttpResult, Session, SharedState};

// ==========================================
// 驾驶舱、报表与配置相关路由
// ==========================================

/// GET /dashboard/stats
pub(crate) async fn dashboard_stats(
    State(state): State<SharedState>,
    Session(ctx): Session,
) -> HttpResult<Json<DashboardStats>> {
    let result = blocking(move || state.dashboard_api.dashboard_stats(&ctx)).await?;
    Ok(Json(result))
}

/// GET /reports/daily-summary?date=
pub(crate) async fn daily_summary(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> HttpResult<Json<DailySummary>> {
    let result = blocking(move || state.dashboard_api.daily_summary(&ctx, query)).await?;
    Ok(Json(result))
}

/// GET /reports/weekly-summary?end_date=
pub(crate) async fn weekly_summary(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> HttpResult<Json<WeeklySummary>> {
    let result = blocking(move || state.dashboard_api.weekly_summary(&ctx, query)).await?;
    Ok(Json(result))
}

/// GET /reports/monthly-summary?year=&month=
pub(crate) async fn monthly_summary(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> HttpResult<Json<MonthlySummary>> {
    let result = blocking(move || state.dashboard_api.monthly_summary(&ctx, query)).await?;
    Ok(Json(result))
}

/// GET /reports/customer-analytics?end_date=&days=
pub(crate) async fn customer_analytics(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> HttpResult<Json<CustomerAnalytics>> {
    let result = blocking(move || state.dashboard_api.customer_analytics(&ctx, query)).await?;
    Ok(Json(result))
}

/// GET /reports/waitlist-analysis?end_date=&days=
pub(crate) async fn waitlist_analysis(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> HttpResult<Json<WaitlistAnalysis>> {
    let result = blocking(move || state.dashboard_api.waitlist_analysis(&ctx, query)).await?;
    Ok(Json(result))
}

/// GET /config
pub(crate) async fn list_configs(
    State(state): State<SharedState>,
    Session(ctx): Session,
) -> HttpResult<Json<Vec<ConfigItem>>> {
    let result = blocking(move || state.config_api.list_configs(&ctx)).await?;
    Ok(Json(result))
}

/// PUT /config/:key
pub(crate) async fn update_config(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(key): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateConfigRequest>,
) -> HttpResult<Json<ConfigItem>> {
    let result = blocking(move || state.config_api.update_config(&ctx, &key, req)).await?;
    Ok(Json(result))
}
