// ==========================================
// 雏鸡订单分配系统 - 订单簿
// ==========================================
// 职责: 下单校验 / 订单查询（惰性分页） / 修改 / 取消
// 红线: 校验在任何写入之前完成；失败不落库
// 红线: 下单、修改、取消与同日分配运行互斥（日期锁）
// ==========================================

use crate::domain::order::{Order, OrderChanges, OrderFilter};
use crate::domain::types::{AllocationStatus, OrderStatus};
use crate::engine::date_lock::DateLockRegistry;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{AllocationEvent, AllocationEventPublisher, AllocationEventType};
use crate::repository::{
    AllocationFilter, AllocationRepository, CustomerRepository, OrderRepository, RepositoryError,
    RepositoryResult,
};
use chrono::NaiveDate;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 默认分页大小
pub const DEFAULT_PAGE_SIZE: usize = 200;

// ==========================================
// OrderList - 可重复迭代的订单序列
// ==========================================
/// 订单查询结果（惰性）
///
/// 每次调用 `iter()` 都从头开始按ID键集分页读取，
/// 只有消费到某一页时才会访问数据库。
#[derive(Clone)]
pub struct OrderList {
    repo: Arc<OrderRepository>,
    filter: OrderFilter,
    page_size: usize,
}

impl OrderList {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn filter(&self) -> &OrderFilter {
        &self.filter
    }

    /// 从头开始迭代
    pub fn iter(&self) -> OrderIter {
        OrderIter {
            repo: self.repo.clone(),
            filter: self.filter.clone(),
            page_size: self.page_size,
            buffer: VecDeque::new(),
            after_id: None,
            exhausted: false,
        }
    }
}

pub struct OrderIter {
    repo: Arc<OrderRepository>,
    filter: OrderFilter,
    page_size: usize,
    buffer: VecDeque<Order>,
    after_id: Option<i64>,
    exhausted: bool,
}

impl Iterator for OrderIter {
    type Item = RepositoryResult<Order>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.repo.list_page(&self.filter, self.after_id, self.page_size) {
                Ok(page) => {
                    if page.len() < self.page_size {
                        self.exhausted = true;
                    }
                    if let Some(last) = page.last() {
                        self.after_id = Some(last.id);
                    }
                    self.buffer.extend(page);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

// ==========================================
// OrderBook - 订单簿
// ==========================================
pub struct OrderBook {
    order_repo: Arc<OrderRepository>,
    customer_repo: Arc<CustomerRepository>,
    allocation_repo: Arc<AllocationRepository>,
    locks: Arc<DateLockRegistry>,
    events: Arc<dyn AllocationEventPublisher>,
}

impl OrderBook {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        customer_repo: Arc<CustomerRepository>,
        allocation_repo: Arc<AllocationRepository>,
        locks: Arc<DateLockRegistry>,
        events: Arc<dyn AllocationEventPublisher>,
    ) -> Self {
        Self {
            order_repo,
            customer_repo,
            allocation_repo,
            locks,
            events,
        }
    }

    /// 下单
    ///
    /// # 参数
    /// - customer_id: 客户ID（必须存在且在用）
    /// - order_qty: 订购数量（> 0）
    /// - requested_date: 期望交付日期
    /// - notes: 备注
    ///
    /// # 返回
    /// - Ok(Order): 状态为 PENDING 的新订单
    /// - Err(InvalidQuantity / UnknownCustomer): 未写入任何数据
    #[instrument(skip(self, notes))]
    pub fn create_order(
        &self,
        customer_id: i64,
        order_qty: i64,
        requested_date: NaiveDate,
        notes: Option<&str>,
    ) -> EngineResult<Order> {
        if order_qty <= 0 {
            return Err(EngineError::InvalidQuantity(format!(
                "订购数量必须大于0: {}",
                order_qty
            )));
        }

        match self.customer_repo.find_by_id(customer_id)? {
            Some(customer) if customer.is_active => {}
            _ => return Err(EngineError::UnknownCustomer(customer_id)),
        }

        let order = self.locks.with_date(requested_date, || {
            self.order_repo
                .insert_with_number(customer_id, order_qty, requested_date, notes)
        })??;

        info!(
            order_number = %order.order_number,
            customer_id,
            order_qty,
            requested_date = %requested_date,
            "订单已创建"
        );
        Ok(order)
    }

    /// 查询订单
    pub fn get_order(&self, id: i64) -> EngineResult<Order> {
        self.order_repo
            .find_by_id(id)?
            .ok_or_else(|| EngineError::not_found("Order", id))
    }

    /// 查询订单（惰性、可重复迭代）
    pub fn list_orders(&self, filter: OrderFilter) -> OrderList {
        OrderList {
            repo: self.order_repo.clone(),
            filter,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// 修改订单
    ///
    /// # 规则
    /// - 只有 PENDING / PARTIALLY_ALLOCATED / WAITLISTED 订单可以修改
    /// - 新数量必须大于0，且不少于已提货与其他日期的有效分配之和
    /// - 已有有效分配的订单不可改期
    /// - 修改后请求重算原日期、新日期以及所有待提货分配所在日期
    #[instrument(skip(self, changes))]
    pub fn update_order(&self, id: i64, changes: OrderChanges) -> EngineResult<Order> {
        if let Some(qty) = changes.order_qty {
            if qty <= 0 {
                return Err(EngineError::InvalidQuantity(format!(
                    "订购数量必须大于0: {}",
                    qty
                )));
            }
        }
        if changes.is_empty() {
            return Err(EngineError::InvalidInput("没有需要修改的内容".to_string()));
        }

        let order = self.get_order(id)?;
        if !matches!(
            order.status,
            OrderStatus::Pending | OrderStatus::PartiallyAllocated | OrderStatus::Waitlisted
        ) {
            return Err(EngineError::InvalidState(format!(
                "订单 {} 状态为 {}，不可修改",
                order.order_number, order.status
            )));
        }

        let allocations = self.allocation_repo.list(&AllocationFilter {
            order_id: Some(id),
            ..Default::default()
        })?;
        let effective: Vec<_> = allocations
            .iter()
            .filter(|a| a.status != AllocationStatus::Cancelled)
            .collect();

        let old_date = order.requested_delivery_date;
        let new_date = changes.requested_delivery_date.unwrap_or(old_date);
        if new_date != old_date && !effective.is_empty() {
            return Err(EngineError::InvalidState(format!(
                "订单 {} 已有分配，不可改期",
                order.order_number
            )));
        }

        let locked: i64 = effective
            .iter()
            .filter(|a| !(a.status == AllocationStatus::Pending && a.allocation_date == old_date))
            .map(|a| a.allocated_qty)
            .sum();
        if let Some(qty) = changes.order_qty {
            if qty < locked {
                return Err(EngineError::InvalidQuantity(format!(
                    "订购数量 {} 少于已提货或其他日期已分配的数量 {}",
                    qty, locked
                )));
            }
        }

        let mut dates: BTreeSet<NaiveDate> = effective
            .iter()
            .filter(|a| a.status == AllocationStatus::Pending)
            .map(|a| a.allocation_date)
            .collect();
        dates.insert(old_date);
        dates.insert(new_date);

        let updated = self
            .locks
            .with_dates(dates.iter().copied(), || {
                self.order_repo.update_details(&order, &changes)
            })?
            .map_err(|e| match e {
                RepositoryError::InvalidStateTransition { .. } => EngineError::InvalidState(
                    format!("订单 {} 已被修改，请刷新后重试", order.order_number),
                ),
                RepositoryError::ValidationError(msg) => EngineError::InvalidQuantity(msg),
                other => other.into(),
            })?;

        info!(
            order_number = %updated.order_number,
            order_qty = updated.order_qty,
            requested_date = %updated.requested_delivery_date,
            "订单已修改"
        );

        for date in dates {
            let event = AllocationEvent::new(
                date,
                AllocationEventType::OrderUpdated,
                format!("update:{}", updated.order_number),
            );
            if let Err(e) = self.events.publish(event) {
                warn!(date = %date, error = %e, "修改后的重算请求未完成");
            }
        }

        Ok(updated)
    }

    /// 取消订单
    ///
    /// # 规则
    /// - FULFILLED / CANCELLED 订单不可取消
    /// - 存在已提货分配的订单不可取消
    /// - 取消后级联取消待提货分配与等待中的候补，并请求重算受影响日期
    #[instrument(skip(self))]
    pub fn cancel_order(&self, id: i64) -> EngineResult<Order> {
        let order = self.get_order(id)?;
        if order.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "订单 {} 状态为 {}，不可取消",
                order.order_number, order.status
            )));
        }

        let allocations = self.allocation_repo.list(&AllocationFilter {
            order_id: Some(id),
            ..Default::default()
        })?;
        if allocations
            .iter()
            .any(|a| a.status == AllocationStatus::PickedUp)
        {
            return Err(EngineError::InvalidState(format!(
                "订单 {} 已有提货记录，不可取消",
                order.order_number
            )));
        }

        // 受影响日期: 期望交付日 + 所有待提货分配所在日期
        let mut dates: BTreeSet<NaiveDate> = allocations
            .iter()
            .filter(|a| a.status == AllocationStatus::Pending)
            .map(|a| a.allocation_date)
            .collect();
        dates.insert(order.requested_delivery_date);

        let cancelled = self
            .locks
            .with_dates(dates.iter().copied(), || {
                self.order_repo.cancel_cascade(id, order.status)
            })?
            .map_err(|e| match e {
                RepositoryError::InvalidStateTransition { .. } => EngineError::InvalidState(
                    format!("订单 {} 状态已变化，请刷新后重试", order.order_number),
                ),
                other => other.into(),
            })?;

        // 锁外可能有晋升在其他日期新增分配，这些日期同样需要重算
        dates.extend(cancelled.released_dates.iter().copied());
        let cancelled = cancelled.order;
        info!(order_number = %cancelled.order_number, "订单已取消");

        for date in dates {
            let event = AllocationEvent::new(
                date,
                AllocationEventType::OrderCancelled,
                format!("cancel:{}", cancelled.order_number),
            );
            if let Err(e) = self.events.publish(event) {
                warn!(date = %date, error = %e, "取消后的重算请求未完成");
            }
        }

        Ok(cancelled)
    }
}
