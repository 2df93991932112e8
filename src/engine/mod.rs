// ==========================================
// 雏鸡订单分配系统 - 引擎层
// ==========================================
// 职责: 实现业务规则（供给、订单、分配、候补、统计）,不拼 SQL
// 红线: 纯计算与持久化分离；分配方案由纯函数给出，仓储单事务写入
// ==========================================

pub mod allocation;
pub mod date_lock;
pub mod error;
pub mod events;
pub mod inventory_ledger;
pub mod orchestrator;
pub mod order_book;
pub mod priority;
pub mod stats;
pub mod waitlist;

// 重导出核心引擎
pub use allocation::{AllocationEngine, RunLine, RunOutcome};
pub use date_lock::DateLockRegistry;
pub use error::{EngineError, EngineResult};
pub use events::{
    AllocationEvent, AllocationEventPublisher, AllocationEventType, InlineRunPublisher,
    NoOpEventPublisher,
};
pub use inventory_ledger::InventoryLedger;
pub use orchestrator::AllocationOrchestrator;
pub use order_book::{OrderBook, OrderIter, OrderList};
pub use priority::AllocationPrioritySorter;
pub use stats::{
    CustomerAnalytics, DailySummary, DashboardStats, MonthlySummary, StatsAggregator,
    WaitlistAnalysis, WeeklySummary, DEFAULT_ANALYSIS_DAYS,
};
pub use waitlist::WaitlistManager;
