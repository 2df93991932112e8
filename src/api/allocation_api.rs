// ==========================================
// 雏鸡订单分配系统 - 分配 API
// ==========================================
// 职责: 手动执行单日分配、分配查询、提货确认、提货清单
// 权限: 执行分配/提货清单需运营；提货确认需运营或司机；客户只能查自己的分配
// ==========================================

use crate::api::access::{customer_scope, require_pickup_role, require_staff};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::allocation::Allocation;
use crate::domain::order::Order;
use crate::domain::types::AllocationStatus;
use crate::domain::user::SessionContext;
use crate::engine::{AllocationOrchestrator, RunOutcome};
use crate::importer::DispatchRow;
use crate::repository::{AllocationFilter, AllocationRepository, CustomerRepository, OrderRepository};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// 执行分配请求（POST /allocations/run）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAllocationRequest {
    pub date: NaiveDate,
}

/// 分配查询参数（GET /allocations）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationQuery {
    pub date: Option<NaiveDate>,
    pub order_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub status: Option<String>,
}

/// 提货确认结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupResponse {
    pub allocation: Allocation,
    pub order: Order,
    pub order_fulfilled: bool,
}

// ==========================================
// AllocationApi - 分配 API
// ==========================================
pub struct AllocationApi {
    orchestrator: Arc<AllocationOrchestrator>,
    allocation_repo: Arc<AllocationRepository>,
    order_repo: Arc<OrderRepository>,
    customer_repo: Arc<CustomerRepository>,
}

impl AllocationApi {
    pub fn new(
        orchestrator: Arc<AllocationOrchestrator>,
        allocation_repo: Arc<AllocationRepository>,
        order_repo: Arc<OrderRepository>,
        customer_repo: Arc<CustomerRepository>,
    ) -> Self {
        Self {
            orchestrator,
            allocation_repo,
            order_repo,
            customer_repo,
        }
    }

    /// 执行单日分配
    pub fn run_allocation(&self, ctx: &SessionContext, req: RunAllocationRequest) -> ApiResult<RunOutcome> {
        require_staff(ctx)?;
        info!(date = %req.date, operator = %ctx.username, "手动执行分配");
        Ok(self.orchestrator.run_date(req.date)?)
    }

    /// 查询分配
    pub fn list_allocations(&self, ctx: &SessionContext, query: AllocationQuery) -> ApiResult<Vec<Allocation>> {
        let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
            None => None,
            Some(raw) => Some(
                AllocationStatus::parse(raw)
                    .ok_or_else(|| ApiError::InvalidInput(format!("未知分配状态: {}", raw)))?,
            ),
        };
        let customer_id = match customer_scope(ctx)? {
            Some(own) => Some(own),
            None => query.customer_id,
        };

        Ok(self.allocation_repo.list(&AllocationFilter {
            date: query.date,
            order_id: query.order_id,
            customer_id,
            status,
        })?)
    }

    /// 确认提货
    pub fn confirm_pickup(&self, ctx: &SessionContext, allocation_id: &str) -> ApiResult<PickupResponse> {
        require_pickup_role(ctx)?;
        let outcome = self.allocation_repo.mark_picked_up(allocation_id, Utc::now())?;
        info!(
            allocation_id,
            order_number = %outcome.order.order_number,
            qty = outcome.allocation.allocated_qty,
            order_fulfilled = outcome.order_fulfilled,
            operator = %ctx.username,
            "提货已确认"
        );
        Ok(PickupResponse {
            allocation: outcome.allocation,
            order: outcome.order,
            order_fulfilled: outcome.order_fulfilled,
        })
    }

    /// 某日待提货清单（按客户等级降序、订单号升序）
    pub fn dispatch_list(&self, ctx: &SessionContext, date: NaiveDate) -> ApiResult<Vec<DispatchRow>> {
        require_staff(ctx)?;
        let allocations = self.allocation_repo.list(&AllocationFilter {
            date: Some(date),
            status: Some(AllocationStatus::Pending),
            ..Default::default()
        })?;

        let mut rows = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            let customer = self
                .customer_repo
                .find_by_id(allocation.customer_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Customer(id={})不存在", allocation.customer_id)))?;
            let order = self
                .order_repo
                .find_by_id(allocation.order_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Order(id={})不存在", allocation.order_id)))?;

            rows.push(DispatchRow {
                customer_code: customer.customer_code,
                farm_name: customer.farm_name,
                phone: customer.phone,
                zone: customer.zone,
                tier: customer.tier,
                order_number: order.order_number,
                allocated_qty: allocation.allocated_qty,
                pickup_deadline: allocation.pickup_deadline,
            });
        }
        rows.sort_by(|a, b| {
            b.tier
                .cmp(&a.tier)
                .then_with(|| a.order_number.cmp(&b.order_number))
        });
        Ok(rows)
    }
}
