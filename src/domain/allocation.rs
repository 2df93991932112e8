// ==========================================
// 雏鸡订单分配系统 - 分配与候补领域模型
// ==========================================
// 红线: 同一订单的有效分配量之和不得超过 order_qty
// 红线: 同一日期的有效分配量之和不得超过当日可用供给
// ==========================================

use crate::domain::customer::CustomerSummary;
use crate::domain::types::{AllocationStatus, WaitlistStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Allocation - 分配记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub allocation_id: String, // UUID
    pub order_id: i64,
    pub customer_id: i64,
    pub allocation_date: NaiveDate,
    pub allocated_qty: i64,
    pub status: AllocationStatus,

    pub pickup_deadline: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    /// 是否计入有效分配量
    pub fn is_effective(&self) -> bool {
        self.status != AllocationStatus::Cancelled
    }
}

// ==========================================
// WaitlistEntry - 候补记录
// ==========================================
// priority_rank 为读取时按 (等级降序, 入队时间升序, 订单号升序) 推导的名次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub entry_id: String, // UUID
    pub order_id: i64,
    pub customer_id: i64,
    pub unmet_qty: i64,
    pub target_date: NaiveDate, // 产生缺口的分配日期
    pub enqueued_at: DateTime<Utc>,
    pub status: WaitlistStatus,
    pub fulfilled_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority_rank: u32,
}

/// 候补记录 + 订单号 + 客户摘要（接口返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistView {
    #[serde(flatten)]
    pub entry: WaitlistEntry,
    pub order_number: String,
    pub customer: Option<CustomerSummary>,
}
