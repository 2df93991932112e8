// ==========================================
// 雏鸡订单分配系统 - 订单 API
// ==========================================
// 职责: 下单、订单查询（嵌入客户摘要）、订单详情、修改、取消
// 权限: 客户账号只能为自己下单、查看/修改/取消自己的订单
// ==========================================

use crate::api::access::{customer_scope, ensure_customer_access};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::allocation::{Allocation, WaitlistEntry};
use crate::domain::customer::{Customer, CustomerSummary};
use crate::domain::order::{Order, OrderChanges, OrderFilter, OrderView};
use crate::domain::types::OrderStatus;
use crate::domain::user::SessionContext;
use crate::engine::OrderBook;
use crate::repository::{
    AllocationFilter, AllocationRepository, CustomerRepository, WaitlistRepository,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// 单次列表返回上限
pub const MAX_LIST_LIMIT: usize = 1000;

/// 下单请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// 客户账号可省略（取自会话）
    #[serde(default)]
    pub customer_id: Option<i64>,
    pub order_qty: i64,
    pub requested_delivery_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 修改订单请求（PUT /orders/:id），缺省字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub order_qty: Option<i64>,
    #[serde(default)]
    pub requested_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 订单查询参数（GET /orders）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
    pub customer_id: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// 订单详情（含分配与候补）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub view: OrderView,
    pub allocations: Vec<Allocation>,
    pub waitlist: Vec<WaitlistEntry>,
}

// ==========================================
// OrderApi - 订单 API
// ==========================================
pub struct OrderApi {
    order_book: Arc<OrderBook>,
    customer_repo: Arc<CustomerRepository>,
    allocation_repo: Arc<AllocationRepository>,
    waitlist_repo: Arc<WaitlistRepository>,
}

impl OrderApi {
    pub fn new(
        order_book: Arc<OrderBook>,
        customer_repo: Arc<CustomerRepository>,
        allocation_repo: Arc<AllocationRepository>,
        waitlist_repo: Arc<WaitlistRepository>,
    ) -> Self {
        Self {
            order_book,
            customer_repo,
            allocation_repo,
            waitlist_repo,
        }
    }

    /// 下单
    ///
    /// # 返回
    /// - Ok((OrderView, Customer)): 新订单视图 + 客户档案（供发送下单确认）
    pub fn create_order(
        &self,
        ctx: &SessionContext,
        req: CreateOrderRequest,
    ) -> ApiResult<(OrderView, Customer)> {
        let customer_id = match (customer_scope(ctx)?, req.customer_id) {
            (Some(own), None) => own,
            (Some(own), Some(id)) if id == own => own,
            (Some(_), Some(id)) => {
                return Err(ApiError::Forbidden(format!("无权为客户 {} 下单", id)))
            }
            (None, Some(id)) => id,
            (None, None) => return Err(ApiError::InvalidInput("customer_id 必填".to_string())),
        };

        let order = self.order_book.create_order(
            customer_id,
            req.order_qty,
            req.requested_delivery_date,
            req.notes.as_deref(),
        )?;
        let customer = self
            .customer_repo
            .find_by_id(customer_id)?
            .ok_or(ApiError::UnknownCustomer(customer_id))?;

        let view = OrderView {
            order,
            customer: Some(CustomerSummary::from(&customer)),
            allocated_qty: 0,
        };
        Ok((view, customer))
    }

    /// 查询订单列表
    pub fn list_orders(&self, ctx: &SessionContext, query: OrderQuery) -> ApiResult<Vec<OrderView>> {
        let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
            None => None,
            Some(raw) => Some(
                OrderStatus::parse(raw)
                    .ok_or_else(|| ApiError::InvalidInput(format!("未知订单状态: {}", raw)))?,
            ),
        };

        let customer_id = match customer_scope(ctx)? {
            Some(own) => Some(own),
            None => query.customer_id,
        };
        let limit = query.limit.unwrap_or(MAX_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

        let filter = OrderFilter {
            status,
            customer_id,
            date_from: query.date_from,
            date_to: query.date_to,
        };

        let mut summaries: HashMap<i64, Option<CustomerSummary>> = HashMap::new();
        let mut views = Vec::new();
        for order in self.order_book.list_orders(filter).iter().take(limit) {
            let order = order?;
            views.push(self.to_view(order, &mut summaries)?);
        }
        Ok(views)
    }

    /// 订单详情
    pub fn get_order(&self, ctx: &SessionContext, id: i64) -> ApiResult<OrderDetail> {
        let order = self.order_book.get_order(id)?;
        ensure_customer_access(ctx, order.customer_id)?;

        let allocations = self.allocation_repo.list(&AllocationFilter {
            order_id: Some(id),
            ..Default::default()
        })?;
        let waitlist = self.waitlist_repo.list_by_order(id)?;
        let view = self.to_view(order, &mut HashMap::new())?;

        Ok(OrderDetail {
            view,
            allocations,
            waitlist,
        })
    }

    /// 修改订单
    pub fn update_order(
        &self,
        ctx: &SessionContext,
        id: i64,
        req: UpdateOrderRequest,
    ) -> ApiResult<OrderView> {
        let order = self.order_book.get_order(id)?;
        ensure_customer_access(ctx, order.customer_id)?;

        let updated = self.order_book.update_order(
            id,
            OrderChanges {
                order_qty: req.order_qty,
                requested_delivery_date: req.requested_delivery_date,
                notes: req.notes,
            },
        )?;
        self.to_view(updated, &mut HashMap::new())
    }

    /// 取消订单
    pub fn cancel_order(&self, ctx: &SessionContext, id: i64) -> ApiResult<OrderView> {
        let order = self.order_book.get_order(id)?;
        ensure_customer_access(ctx, order.customer_id)?;

        let cancelled = self.order_book.cancel_order(id)?;
        self.to_view(cancelled, &mut HashMap::new())
    }

    fn to_view(
        &self,
        order: Order,
        summaries: &mut HashMap<i64, Option<CustomerSummary>>,
    ) -> ApiResult<OrderView> {
        let customer = match summaries.get(&order.customer_id) {
            Some(cached) => cached.clone(),
            None => {
                let summary = self
                    .customer_repo
                    .find_by_id(order.customer_id)?
                    .as_ref()
                    .map(CustomerSummary::from);
                summaries.insert(order.customer_id, summary.clone());
                summary
            }
        };
        let allocated_qty = self.allocation_repo.effective_qty_for_order(order.id)?;

        Ok(OrderView {
            order,
            customer,
            allocated_qty,
        })
    }
}
