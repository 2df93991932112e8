// ==========================================
// 雏鸡订单分配系统 - 引擎层事件发布
// ==========================================
// 职责: 定义分配事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，应用层实现（同步运行 / 后台 worker）
// ==========================================

use crate::engine::orchestrator::AllocationOrchestrator;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 分配事件类型
// ==========================================

/// 触发单日分配重算的事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationEventType {
    /// 实际供给确认
    SupplyConfirmed,
    /// 实际供给覆写
    SupplyOverridden,
    /// 预计供给变更（仅未确认时触发）
    ExpectedSupplyChanged,
    /// 订单取消（释放供给）
    OrderCancelled,
    /// 订单数量或交付日期变更
    OrderUpdated,
    /// 手动触发
    ManualTrigger,
}

impl AllocationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationEventType::SupplyConfirmed => "SupplyConfirmed",
            AllocationEventType::SupplyOverridden => "SupplyOverridden",
            AllocationEventType::ExpectedSupplyChanged => "ExpectedSupplyChanged",
            AllocationEventType::OrderCancelled => "OrderCancelled",
            AllocationEventType::OrderUpdated => "OrderUpdated",
            AllocationEventType::ManualTrigger => "ManualTrigger",
        }
    }
}

/// 分配事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEvent {
    /// 需要重算的交付日期
    pub date: NaiveDate,
    pub event_type: AllocationEventType,
    /// 事件来源描述
    pub source: Option<String>,
}

impl AllocationEvent {
    pub fn new(date: NaiveDate, event_type: AllocationEventType, source: impl Into<String>) -> Self {
        Self {
            date,
            event_type,
            source: Some(source.into()),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 分配事件发布者 Trait
///
/// # 实现说明
/// - `InlineRunPublisher`: 在调用线程内同步执行分配
/// - `AllocationWorkerHandle`（应用层）: 投递到后台 worker 队列
pub trait AllocationEventPublisher: Send + Sync {
    fn publish(&self, event: AllocationEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要自动重算的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl AllocationEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: AllocationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - date={}, event_type={}",
            event.date,
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 同步执行分配的事件发布者
pub struct InlineRunPublisher {
    orchestrator: Arc<AllocationOrchestrator>,
}

impl InlineRunPublisher {
    pub fn new(orchestrator: Arc<AllocationOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

impl AllocationEventPublisher for InlineRunPublisher {
    fn publish(&self, event: AllocationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.orchestrator.run_date(event.date)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_publisher() {
        let event = AllocationEvent::new(
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            AllocationEventType::ManualTrigger,
            "test",
        );
        assert!(NoOpEventPublisher.publish(event).is_ok());
    }
}
