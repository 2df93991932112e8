use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::{AllocationQuery, ApiError, PickupResponse, ProcessWaitlistRequest, RunAllocationRequest, WaitlistQuery};
use crate::app::allocation_worker::deadline_hour;
use crate::domain::allocation::{Allocation, WaitlistView};
use crate::engine::RunOutcome;
use crate::importer::write_dispatch_list;

use super::common::{ApiJson, ApiPath, ApiQuery, blocking, HttpResult, Session, SharedState};

// ==========================================
// 分配与候补相关路由
// ==========================================

#[derive(Debug, Deserialize)]
pub(crate) struct DispatchListQuery {
    pub date: NaiveDate,
}

/// 运行结果通知（异步，不阻塞响应）
fn spawn_run_notification(state: &SharedState, outcome: &RunOutcome) {
    let notifier = state.notifier.clone();
    let rules = state.rules.clone();
    let outcome = outcome.clone();
    tokio::spawn(async move {
        let hour = deadline_hour(rules.as_ref());
        let report = notifier.notify_run(&outcome, hour).await;
        tracing::debug!(date = %outcome.date, sent = report.sent, failed = report.failed, "分配通知已发送");
    });
}

/// POST /allocations/run
pub(crate) async fn run_allocation(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiJson(req): ApiJson<RunAllocationRequest>,
) -> HttpResult<Json<RunOutcome>> {
    let api = state.allocation_api.clone();
    let outcome = blocking(move || api.run_allocation(&ctx, req)).await?;
    spawn_run_notification(&state, &outcome);
    Ok(Json(outcome))
}

/// GET /allocations
pub(crate) async fn list_allocations(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<AllocationQuery>,
) -> HttpResult<Json<Vec<Allocation>>> {
    let result = blocking(move || state.allocation_api.list_allocations(&ctx, query)).await?;
    Ok(Json(result))
}

/// POST /allocations/:id/confirm-pickup
pub(crate) async fn confirm_pickup(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiPath(id): ApiPath<String>,
) -> HttpResult<Json<PickupResponse>> {
    let result = blocking(move || state.allocation_api.confirm_pickup(&ctx, &id)).await?;
    Ok(Json(result))
}

/// GET /allocations/dispatch-list?date=YYYY-MM-DD（text/csv）
pub(crate) async fn dispatch_list(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<DispatchListQuery>,
) -> HttpResult<Response> {
    let date = query.date;
    let csv = blocking(move || {
        let rows = state.allocation_api.dispatch_list(&ctx, date)?;
        let mut buf = Vec::new();
        write_dispatch_list(&mut buf, &rows)?;
        Ok::<_, ApiError>(buf)
    })
    .await?;

    let disposition = format!("attachment; filename=\"dispatch_{}.csv\"", date);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

/// GET /waitlist
pub(crate) async fn list_waitlist(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiQuery(query): ApiQuery<WaitlistQuery>,
) -> HttpResult<Json<Vec<WaitlistView>>> {
    let result = blocking(move || state.waitlist_api.list_waitlist(&ctx, query)).await?;
    Ok(Json(result))
}

/// POST /waitlist/process
pub(crate) async fn process_waitlist(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiJson(req): ApiJson<ProcessWaitlistRequest>,
) -> HttpResult<Json<RunOutcome>> {
    let api = state.waitlist_api.clone();
    let outcome = blocking(move || api.process_waitlist(&ctx, req)).await?;
    spawn_run_notification(&state, &outcome);
    Ok(Json(outcome))
}
