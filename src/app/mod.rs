// ==========================================
// 雏鸡订单分配系统 - 应用层
// ==========================================
// 职责: 组装应用状态、后台分配 worker、HTTP 路由
// ==========================================

pub mod allocation_worker;
pub mod http;
pub mod state;

// 重导出
pub use allocation_worker::{allocation_worker, AllocationWorker, AllocationWorkerHandle};
pub use http::build_router;
pub use state::AppState;
