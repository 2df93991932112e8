// ==========================================
// 雏鸡订单分配系统 - 客户领域模型
// ==========================================
// 红线: 客户身份不可变，等级仅允许管理员调整
// ==========================================

use crate::domain::types::CustomerTier;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Customer - 客户（养殖场）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    // ===== 主键 =====
    pub id: i64,
    pub customer_code: String, // 外部客户编码（唯一）

    // ===== 基础信息 =====
    pub farm_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub zone: Option<String>,
    pub address: Option<String>,

    // ===== 分配相关 =====
    pub tier: CustomerTier,                      // 客户等级（分配优先级）
    pub last_fulfilled_date: Option<NaiveDate>,  // 最近一次完成提货日期
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 客户摘要（嵌入订单/候补响应）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: i64,
    pub farm_name: String,
    pub tier: CustomerTier,
}

impl From<&Customer> for CustomerSummary {
    fn from(c: &Customer) -> Self {
        Self {
            id: c.id,
            farm_name: c.farm_name.clone(),
            tier: c.tier,
        }
    }
}

/// 新建客户参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub customer_code: String,
    pub farm_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub zone: Option<String>,
    pub address: Option<String>,
    pub tier: CustomerTier,
}
