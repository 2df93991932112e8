// ==========================================
// 雏鸡订单分配系统 - 分配引擎（单日）
// ==========================================
// 职责: 根据单日快照计算分配方案（纯计算，不做 I/O）
// 输入: DateSnapshot + AllocationRules
// 输出: DatePlan（主分配 + 剩余供给的候补晋升）
// 红线: 分配总量 <= 可用供给 - 已承诺量
// 红线: 同一快照必得同一方案（确定性排序）
// ==========================================

use crate::config::AllocationRules;
use crate::domain::allocation_plan::{
    AllocationGrant, BacklogEntry, DatePlan, DateSnapshot, StatusTransition, WaitlistChange,
};
use crate::domain::types::{CustomerTier, OrderStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::priority::AllocationPrioritySorter;
use crate::engine::waitlist::plan_promotion;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

// ==========================================
// RunOutcome - 单次运行结果（接口返回）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLine {
    pub order_id: i64,
    pub order_number: String,
    pub customer_id: i64,
    pub tier: CustomerTier,
    pub qty: i64,
    /// 相对运行前有变化（候补行: 订单状态或缺口数量变化；分配行恒为 true）
    #[serde(default)]
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub date: NaiveDate,
    pub supply_available: i64,
    pub committed_qty: i64,
    pub allocated_total: i64,
    /// 本次主分配得到的数量
    pub allocated: Vec<RunLine>,
    /// 本次进入/留在候补的缺口
    pub waitlisted: Vec<RunLine>,
    /// 剩余供给晋升给候补的数量
    pub promoted: Vec<RunLine>,
    /// 运行后当日仍未分配的供给
    pub remaining: i64,
}

impl RunOutcome {
    /// 由快照与已提交方案汇总运行结果
    pub fn from_plan(snapshot: &DateSnapshot, plan: &DatePlan) -> Self {
        let mut index: HashMap<i64, (&str, CustomerTier)> = HashMap::new();
        for c in &snapshot.candidates {
            index.insert(c.order_id, (c.order_number.as_str(), c.tier));
        }
        for w in &snapshot.waiting {
            index
                .entry(w.order_id)
                .or_insert((w.order_number.as_str(), w.tier));
        }

        let line = |order_id: i64, customer_id: i64, qty: i64, changed: bool| {
            let (number, tier) = index
                .get(&order_id)
                .copied()
                .unwrap_or(("", CustomerTier::Standard));
            RunLine {
                order_id,
                order_number: number.to_string(),
                customer_id,
                tier,
                qty,
                changed,
            }
        };

        let allocated = plan
            .grants
            .iter()
            .filter(|g| !g.promoted)
            .map(|g| line(g.order_id, g.customer_id, g.qty, true))
            .collect();
        let promoted = plan
            .grants
            .iter()
            .filter(|g| g.promoted)
            .map(|g| line(g.order_id, g.customer_id, g.qty, true))
            .collect();

        // 运行前的候补缺口与本次状态迁移，用于判断候补是否有变化
        let prior_unmet: HashMap<i64, i64> = snapshot
            .waiting
            .iter()
            .map(|w| (w.order_id, w.unmet_qty))
            .collect();
        let status_moved: HashSet<i64> = plan
            .transitions
            .iter()
            .filter(|t| t.from != t.to)
            .map(|t| t.order_id)
            .collect();

        let candidate_ids: HashSet<i64> = snapshot.candidates.iter().map(|c| c.order_id).collect();
        let waitlisted = plan
            .waitlist
            .iter()
            .filter_map(|change| match change {
                WaitlistChange::Upsert {
                    order_id,
                    customer_id,
                    unmet_qty,
                    ..
                } if candidate_ids.contains(order_id) => {
                    let changed = status_moved.contains(order_id)
                        || prior_unmet.get(order_id) != Some(unmet_qty);
                    Some(line(*order_id, *customer_id, *unmet_qty, changed))
                }
                _ => None,
            })
            .collect();

        let allocated_total = plan.granted_total();
        Self {
            date: snapshot.date,
            supply_available: plan.supply_available,
            committed_qty: plan.committed_qty,
            allocated_total,
            allocated,
            waitlisted,
            promoted,
            remaining: (plan.supply_available - plan.committed_qty - allocated_total).max(0),
        }
    }
}

/// 提货截止时间（分配日当天 N 点，UTC）
pub fn pickup_deadline(date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    date.and_hms_opt(hour.min(23), 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// 候补是否仍在回溯窗口内
pub fn within_waiting_period(entry: &BacklogEntry, date: NaiveDate, waiting_period_days: i64) -> bool {
    entry.target_date >= date - Duration::days(waiting_period_days.max(0))
}

// ==========================================
// AllocationEngine - 单日分配引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationEngine {
    sorter: AllocationPrioritySorter,
}

impl AllocationEngine {
    pub fn new() -> Self {
        Self {
            sorter: AllocationPrioritySorter::new(),
        }
    }

    /// 计算单日分配方案
    ///
    /// # 步骤
    /// 1) 可用供给 = 实际供给（已确认）或预计供给；无供给记录返回 NoSupplyData
    /// 2) 已承诺量 = 当日有效分配中不可重算的部分；超过供给返回 OverCommitted
    /// 3) 候选订单按 (等级降序, 下单时间升序, 订单号升序) 依次分配
    ///    grant = min(剩余需求, 剩余供给, 单日上限)
    /// 4) 剩余供给按优先级晋升给回溯窗口内的候补
    ///
    /// # 返回
    /// - Ok(DatePlan): 待写入的方案
    /// - Err: 校验失败（调用方不得写入任何数据）
    pub fn plan_date(&self, snapshot: &DateSnapshot, rules: &AllocationRules) -> EngineResult<DatePlan> {
        let date = snapshot.date;

        // ==========================================
        // 步骤1: 可用供给
        // ==========================================
        let supply = snapshot
            .supply
            .as_ref()
            .ok_or(EngineError::NoSupplyData { date })?;
        let available = supply.available();

        // ==========================================
        // 步骤2: 已承诺量
        // ==========================================
        let committed = snapshot.committed_qty();
        if committed > available {
            return Err(EngineError::OverCommitted {
                date,
                committed,
                supply: available,
            });
        }

        let deadline = pickup_deadline(date, rules.pickup_deadline_hour);
        let mut pool = available - committed;
        let mut plan = DatePlan {
            date: Some(date),
            supply_available: available,
            committed_qty: committed,
            ..Default::default()
        };

        // ==========================================
        // 步骤3: 候选订单主分配
        // ==========================================
        let candidates = self.sorter.sort_candidates(snapshot.candidates.clone());
        for c in &candidates {
            plan.replaced_order_ids.push(c.order_id);

            let remaining = c.remaining_qty();
            let day_cap = (rules.max_per_order_per_day - c.picked_up_on_date).max(0);
            let grant = remaining.min(pool).min(day_cap);
            pool -= grant;

            if grant > 0 {
                plan.grants.push(AllocationGrant {
                    order_id: c.order_id,
                    customer_id: c.customer_id,
                    qty: grant,
                    pickup_deadline: deadline,
                    promoted: false,
                });
            }

            let unmet = remaining - grant;
            let to = if unmet == 0 {
                OrderStatus::Allocated
            } else if grant > 0 {
                OrderStatus::PartiallyAllocated
            } else {
                OrderStatus::Waitlisted
            };
            if !c.status.can_transition_to(to) {
                return Err(EngineError::InvalidTransition {
                    order_id: c.order_id,
                    from: c.status,
                    to,
                });
            }
            plan.transitions.push(StatusTransition {
                order_id: c.order_id,
                from: c.status,
                to,
            });

            plan.waitlist.push(if unmet > 0 {
                WaitlistChange::Upsert {
                    order_id: c.order_id,
                    customer_id: c.customer_id,
                    unmet_qty: unmet,
                    target_date: date,
                }
            } else {
                WaitlistChange::Fulfill {
                    order_id: c.order_id,
                    fulfilled_date: date,
                }
            });

            debug!(
                order_number = %c.order_number,
                tier = %c.tier,
                remaining,
                grant,
                status = %to,
                "候选订单分配"
            );
        }
        plan.leftover = pool;

        // ==========================================
        // 步骤4: 剩余供给晋升候补
        // ==========================================
        let candidate_ids: HashSet<i64> = candidates.iter().map(|c| c.order_id).collect();
        let backlog: Vec<BacklogEntry> = snapshot
            .waiting
            .iter()
            .filter(|w| !candidate_ids.contains(&w.order_id))
            .filter(|w| within_waiting_period(w, date, rules.waiting_period_days))
            .cloned()
            .collect();

        let promotion = plan_promotion(&self.sorter, date, backlog, pool, rules)?;
        plan.grants.extend(promotion.grants);
        plan.transitions.extend(promotion.transitions);
        plan.waitlist.extend(promotion.waitlist);
        plan.unused = promotion.unused;

        Ok(plan)
    }
}
