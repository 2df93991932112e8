// ==========================================
// 雏鸡订单分配系统 - 候补管理
// ==========================================
// 职责: 候补登记 / 按优先级晋升 / 排名查询 / 移除
// 排序: (等级降序, 入队时间升序, 订单号升序)
// 红线: 晋升与单日分配共用日期锁，写入在单个事务内完成
// ==========================================

use crate::config::{AllocationRules, AllocationRulesReader};
use crate::domain::allocation::{WaitlistEntry, WaitlistView};
use crate::domain::allocation_plan::{
    AllocationGrant, BacklogEntry, DatePlan, StatusTransition, WaitlistChange,
};
use crate::domain::types::OrderStatus;
use crate::engine::allocation::{pickup_deadline, within_waiting_period, RunOutcome};
use crate::engine::date_lock::DateLockRegistry;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::priority::AllocationPrioritySorter;
use crate::repository::{AllocationRepository, RepositoryError, WaitlistRepository};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument};

/// 晋升方案
#[derive(Debug, Clone, Default)]
pub struct PromotionPlan {
    pub grants: Vec<AllocationGrant>,
    pub transitions: Vec<StatusTransition>,
    pub waitlist: Vec<WaitlistChange>,
    /// 晋升后未用完的数量
    pub unused: i64,
}

/// 计算候补晋升（纯计算）
///
/// # 参数
/// - backlog: 参与晋升的候补（调用方已按回溯窗口过滤）
/// - qty: 可用于晋升的数量
///
/// # 规则
/// - grant = min(缺口, 剩余数量, 单日上限 - 该订单当日已有分配)
/// - 缺口全部满足: 候补关闭，订单 -> ALLOCATED
/// - 部分满足: 候补保留剩余缺口，订单 -> PARTIALLY_ALLOCATED
pub fn plan_promotion(
    sorter: &AllocationPrioritySorter,
    date: NaiveDate,
    backlog: Vec<BacklogEntry>,
    qty: i64,
    rules: &AllocationRules,
) -> EngineResult<PromotionPlan> {
    let deadline = pickup_deadline(date, rules.pickup_deadline_hour);
    let mut pool = qty.max(0);
    let mut plan = PromotionPlan::default();

    for entry in sorter.sort_backlog(backlog) {
        if pool == 0 {
            break;
        }

        let day_cap = (rules.max_per_order_per_day - entry.allocated_on_date).max(0);
        let grant = entry.unmet_qty.min(pool).min(day_cap);
        if grant <= 0 {
            continue;
        }
        pool -= grant;

        plan.grants.push(AllocationGrant {
            order_id: entry.order_id,
            customer_id: entry.customer_id,
            qty: grant,
            pickup_deadline: deadline,
            promoted: true,
        });

        let rest = entry.unmet_qty - grant;
        let to = if rest == 0 {
            plan.waitlist.push(WaitlistChange::Fulfill {
                order_id: entry.order_id,
                fulfilled_date: date,
            });
            OrderStatus::Allocated
        } else {
            plan.waitlist.push(WaitlistChange::Upsert {
                order_id: entry.order_id,
                customer_id: entry.customer_id,
                unmet_qty: rest,
                target_date: entry.target_date,
            });
            OrderStatus::PartiallyAllocated
        };

        if !entry.order_status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                order_id: entry.order_id,
                from: entry.order_status,
                to,
            });
        }
        plan.transitions.push(StatusTransition {
            order_id: entry.order_id,
            from: entry.order_status,
            to,
        });
    }

    plan.unused = pool;
    Ok(plan)
}

// ==========================================
// WaitlistManager - 候补管理器
// ==========================================
pub struct WaitlistManager {
    waitlist_repo: Arc<WaitlistRepository>,
    allocation_repo: Arc<AllocationRepository>,
    rules: Arc<dyn AllocationRulesReader>,
    locks: Arc<DateLockRegistry>,
    sorter: AllocationPrioritySorter,
}

impl WaitlistManager {
    pub fn new(
        waitlist_repo: Arc<WaitlistRepository>,
        allocation_repo: Arc<AllocationRepository>,
        rules: Arc<dyn AllocationRulesReader>,
        locks: Arc<DateLockRegistry>,
    ) -> Self {
        Self {
            waitlist_repo,
            allocation_repo,
            rules,
            locks,
            sorter: AllocationPrioritySorter::new(),
        }
    }

    /// 登记候补（按订单插入或更新，保留原入队时间）
    pub fn enqueue(
        &self,
        order_id: i64,
        customer_id: i64,
        unmet_qty: i64,
        target_date: NaiveDate,
    ) -> EngineResult<WaitlistEntry> {
        if unmet_qty <= 0 {
            return Err(EngineError::InvalidQuantity(format!(
                "候补缺口必须大于0: {}",
                unmet_qty
            )));
        }
        let entry = self
            .locks
            .with_date(target_date, || {
                self.waitlist_repo
                    .enqueue(order_id, customer_id, unmet_qty, target_date)
            })??;
        Ok(entry)
    }

    /// 将新增可用量按优先级晋升给候补
    ///
    /// # 参数
    /// - date: 晋升分配所在日期
    /// - newly_available_qty: 可用于晋升的数量（不超过当日剩余供给）
    ///
    /// # 返回
    /// - Ok(RunOutcome): promoted 列出每条晋升
    /// - Err(NoSupplyData): 当日无供给记录
    #[instrument(skip(self))]
    pub fn promote(&self, date: NaiveDate, newly_available_qty: i64) -> EngineResult<RunOutcome> {
        if newly_available_qty < 0 {
            return Err(EngineError::InvalidQuantity(format!(
                "晋升数量不能为负: {}",
                newly_available_qty
            )));
        }
        let rules = self
            .rules
            .load_rules()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let sorter = self.sorter;

        let (snapshot, plan) = self.locks.with_date(date, || {
            self.allocation_repo.with_date_plan(date, |snapshot| {
                let remaining = snapshot
                    .remaining_supply()
                    .ok_or(EngineError::NoSupplyData { date })?;
                let qty = newly_available_qty.min(remaining);

                let backlog: Vec<BacklogEntry> = snapshot
                    .waiting
                    .iter()
                    .filter(|w| within_waiting_period(w, date, rules.waiting_period_days))
                    .cloned()
                    .collect();
                let promotion = plan_promotion(&sorter, date, backlog, qty, &rules)?;

                Ok::<DatePlan, EngineError>(DatePlan {
                    date: Some(date),
                    supply_available: snapshot
                        .supply
                        .as_ref()
                        .map(|s| s.available())
                        .unwrap_or(0),
                    committed_qty: snapshot.allocated_on_date,
                    grants: promotion.grants,
                    transitions: promotion.transitions,
                    waitlist: promotion.waitlist,
                    leftover: qty,
                    unused: promotion.unused,
                    ..Default::default()
                })
            })
        })??;

        let outcome = RunOutcome::from_plan(&snapshot, &plan);
        info!(
            date = %date,
            offered = plan.leftover,
            promoted = outcome.promoted.len(),
            unused = plan.unused,
            "候补晋升完成"
        );
        Ok(outcome)
    }

    /// 查询等待中的候补（优先级顺序，名次从 1 开始）
    ///
    /// # 参数
    /// - date: 可选，仅返回 target_date <= date 的候补（即可被该日供给晋升的候补）
    pub fn list_waitlist(&self, date: Option<NaiveDate>) -> EngineResult<Vec<WaitlistView>> {
        let views = self.waitlist_repo.list_waiting_views(date)?;
        Ok(self.sorter.rank_waitlist(views))
    }

    /// 移除订单的等待中候补
    ///
    /// # 返回
    /// - Ok(true): 已取消
    /// - Ok(false): 该订单没有等待中的候补
    pub fn remove(&self, order_id: i64) -> EngineResult<bool> {
        match self.waitlist_repo.cancel_waiting(order_id) {
            Ok(removed) => Ok(removed),
            Err(RepositoryError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 等待中的候补数
    pub fn count_waiting(&self) -> EngineResult<i64> {
        Ok(self.waitlist_repo.count_waiting()?)
    }
}
