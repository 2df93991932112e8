// ==========================================
// 雏鸡订单分配系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态机
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod allocation;
pub mod allocation_plan;
pub mod customer;
pub mod notification;
pub mod order;
pub mod supply;
pub mod types;
pub mod user;

// 重导出核心类型
pub use allocation::{Allocation, WaitlistEntry, WaitlistView};
pub use allocation_plan::{
    AllocationCandidate, AllocationGrant, BacklogEntry, DatePlan, DateSnapshot, StatusTransition,
    WaitlistChange,
};
pub use customer::{Customer, CustomerSummary, NewCustomer};
pub use notification::{Notification, OutgoingMessage};
pub use order::{Order, OrderChanges, OrderFilter, OrderView};
pub use supply::{SupplyAudit, SupplyRecord};
pub use types::{
    AllocationStatus, CustomerTier, NotificationKind, NotificationStatus, OrderStatus, UserRole,
    WaitlistStatus,
};
pub use user::{SessionContext, User};
