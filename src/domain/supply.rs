// ==========================================
// 雏鸡订单分配系统 - 每日供给领域模型
// ==========================================
// 红线: actual_supply 一经确认不可修改（仅允许带审计的覆写）
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// SupplyRecord - 每日供给记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyRecord {
    pub date: NaiveDate,              // 主键（唯一）
    pub expected_supply: i64,         // 预计出雏数
    pub actual_supply: Option<i64>,   // 实际出雏数（确认前为空）
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupplyRecord {
    /// 分配可用量：已确认取实际值，否则以预计值作为临时上限
    pub fn available(&self) -> i64 {
        self.actual_supply.unwrap_or(self.expected_supply).max(0)
    }

    /// 是否已确认实际供给
    pub fn is_confirmed(&self) -> bool {
        self.actual_supply.is_some()
    }
}

/// 实际供给覆写审计记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyAudit {
    pub id: i64,
    pub date: NaiveDate,
    pub old_actual_supply: Option<i64>,
    pub new_actual_supply: i64,
    pub reason: String,
    pub operator: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expected: i64, actual: Option<i64>) -> SupplyRecord {
        SupplyRecord {
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            expected_supply: expected,
            actual_supply: actual,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_available_prefers_actual() {
        assert_eq!(record(100, None).available(), 100);
        assert_eq!(record(100, Some(80)).available(), 80);
        assert_eq!(record(100, Some(0)).available(), 0);
        assert!(record(100, Some(0)).is_confirmed());
    }
}
