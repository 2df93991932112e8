// ==========================================
// 雏鸡订单分配系统 - 分配快照与分配方案
// ==========================================
// 职责: 引擎输入（单日快照）与引擎输出（单日方案）
// 红线: 快照与方案均为纯数据，读写由仓储在同一事务内完成
// ==========================================

use crate::domain::supply::SupplyRecord;
use crate::domain::types::{CustomerTier, OrderStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// DateSnapshot - 单日分配快照
// ==========================================
#[derive(Debug, Clone)]
pub struct DateSnapshot {
    pub date: NaiveDate,
    pub supply: Option<SupplyRecord>,

    /// 当日全部有效分配量
    pub allocated_on_date: i64,
    /// 其中可被本次重算替换的部分（候选订单在当日的待提货分配）
    pub replaceable_on_date: i64,

    /// 候选订单（当日交付且处于未结状态）
    pub candidates: Vec<AllocationCandidate>,
    /// 等待中的候补（target_date <= 当日）
    pub waiting: Vec<BacklogEntry>,
}

impl DateSnapshot {
    /// 不可被本次重算替换的已承诺量
    pub fn committed_qty(&self) -> i64 {
        (self.allocated_on_date - self.replaceable_on_date).max(0)
    }

    /// 当日剩余可分配量（不含重算）
    pub fn remaining_supply(&self) -> Option<i64> {
        self.supply
            .as_ref()
            .map(|s| (s.available() - self.allocated_on_date).max(0))
    }
}

/// 分配候选订单
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationCandidate {
    pub order_id: i64,
    pub order_number: String,
    pub customer_id: i64,
    pub tier: CustomerTier,
    pub order_date: DateTime<Utc>,
    pub order_qty: i64,
    pub status: OrderStatus,

    /// 其他日期的有效分配量
    pub allocated_elsewhere: i64,
    /// 当日已提货量（不可重算）
    pub picked_up_on_date: i64,
}

impl AllocationCandidate {
    /// 本次可分配的剩余需求
    pub fn remaining_qty(&self) -> i64 {
        (self.order_qty - self.allocated_elsewhere - self.picked_up_on_date).max(0)
    }
}

/// 候补队列条目（含排序所需的订单/客户信息）
#[derive(Debug, Clone, PartialEq)]
pub struct BacklogEntry {
    pub entry_id: String,
    pub order_id: i64,
    pub order_number: String,
    pub customer_id: i64,
    pub tier: CustomerTier,
    pub enqueued_at: DateTime<Utc>,
    pub unmet_qty: i64,
    pub target_date: NaiveDate,
    pub order_status: OrderStatus,

    /// 该订单在快照日期上已有的有效分配量（用于单日上限）
    pub allocated_on_date: i64,
}

// ==========================================
// DatePlan - 单日分配方案
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct DatePlan {
    pub date: Option<NaiveDate>,
    pub supply_available: i64,
    pub committed_qty: i64,

    /// 需删除当日待提货分配的订单（重算替换）
    pub replaced_order_ids: Vec<i64>,
    pub grants: Vec<AllocationGrant>,
    pub transitions: Vec<StatusTransition>,
    pub waitlist: Vec<WaitlistChange>,

    /// 主分配后的剩余供给（用于候补晋升）
    pub leftover: i64,
    /// 晋升后仍剩余的供给
    pub unused: i64,
}

impl DatePlan {
    pub fn granted_total(&self) -> i64 {
        self.grants.iter().map(|g| g.qty).sum()
    }
}

/// 单条分配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationGrant {
    pub order_id: i64,
    pub customer_id: i64,
    pub qty: i64,
    pub pickup_deadline: Option<DateTime<Utc>>,
    /// 是否来自候补晋升
    pub promoted: bool,
}

/// 订单状态迁移（条件更新: WHERE status = from）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub order_id: i64,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// 候补变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WaitlistChange {
    /// 按订单号插入或更新等待中的候补（保留原入队时间）
    Upsert {
        order_id: i64,
        customer_id: i64,
        unmet_qty: i64,
        target_date: NaiveDate,
    },
    /// 关闭等待中的候补
    Fulfill {
        order_id: i64,
        fulfilled_date: NaiveDate,
    },
}
