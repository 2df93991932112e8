// ==========================================
// 雏鸡订单分配系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod allocation_repo;
pub mod customer_repo;
pub mod error;
pub mod notification_repo;
pub mod order_repo;
pub mod supply_repo;
pub mod user_repo;
pub mod waitlist_repo;

// 重导出核心仓储
pub use allocation_repo::{
    AllocationFilter, AllocationRepository, CustomerVolume, DailyAllocationTotal, PickupOutcome,
    TierAllocationSummary,
};
pub use customer_repo::CustomerRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use notification_repo::NotificationRepository;
pub use order_repo::{CancelledOrder, OrderRepository, TierOrderOutcome};
pub use supply_repo::{ConfirmOutcome, SupplyRepository};
pub use user_repo::UserRepository;
pub use waitlist_repo::{WaitlistCounts, WaitlistRepository};
