// ==========================================
// 雏鸡订单分配系统 - 分配规则读取 Trait
// ==========================================
// 职责: 定义分配引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;

/// 配置读取错误
pub type ConfigError = Box<dyn Error + Send + Sync>;

// ==========================================
// AllocationRules - 分配规则快照
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRules {
    /// 单个订单单日最大分配量
    pub max_per_order_per_day: i64,
    /// 提货截止时刻（分配日当天的小时，UTC）
    pub pickup_deadline_hour: u32,
    /// 候补可回溯天数（早于 分配日 - N 天产生的候补不再参与晋升）
    pub waiting_period_days: i64,
}

impl Default for AllocationRules {
    fn default() -> Self {
        Self {
            max_per_order_per_day: 1000,
            pickup_deadline_hour: 14,
            waiting_period_days: 7,
        }
    }
}

// ==========================================
// AllocationRulesReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait AllocationRulesReader: Send + Sync {
    /// 获取单个订单单日最大分配量
    ///
    /// # 默认值
    /// - 1000
    fn get_max_per_order_per_day(&self) -> Result<i64, ConfigError>;

    /// 获取提货截止小时
    ///
    /// # 默认值
    /// - 14
    fn get_pickup_deadline_hour(&self) -> Result<u32, ConfigError>;

    /// 获取候补可回溯天数
    ///
    /// # 默认值
    /// - 7
    fn get_waiting_period_days(&self) -> Result<i64, ConfigError>;

    /// 一次读取全部分配规则
    fn load_rules(&self) -> Result<AllocationRules, ConfigError> {
        Ok(AllocationRules {
            max_per_order_per_day: self.get_max_per_order_per_day()?,
            pickup_deadline_hour: self.get_pickup_deadline_hour()?,
            waiting_period_days: self.get_waiting_period_days()?,
        })
    }
}

/// 固定规则（测试与离线计算使用）
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRules(pub AllocationRules);

impl AllocationRulesReader for StaticRules {
    fn get_max_per_order_per_day(&self) -> Result<i64, ConfigError> {
        Ok(self.0.max_per_order_per_day)
    }

    fn get_pickup_deadline_hour(&self) -> Result<u32, ConfigError> {
        Ok(self.0.pickup_deadline_hour)
    }

    fn get_waiting_period_days(&self) -> Result<i64, ConfigError> {
        Ok(self.0.waiting_period_days)
    }
}
