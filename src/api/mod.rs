// ==========================================
// 雏鸡订单分配系统 - API 层
// ==========================================
// 职责: 业务 API 接口（权限校验 + 参数解析 + 引擎调用），供 HTTP 路由调用
// ==========================================

pub mod access;
pub mod allocation_api;
pub mod auth_api;
pub mod config_api;
pub mod customer_api;
pub mod dashboard_api;
pub mod error;
pub mod inventory_api;
pub mod order_api;
pub mod waitlist_api;

// 重导出核心类型
pub use allocation_api::{AllocationApi, AllocationQuery, PickupResponse, RunAllocationRequest};
pub use auth_api::{
    AuthApi, ChangePasswordRequest, LoginRequest, LoginResponse, MeResponse, RegisterRequest,
};
pub use config_api::{ConfigApi, UpdateConfigRequest};
pub use customer_api::{CreateCustomerRequest, CustomerApi, CustomerQuery, UpdateTierRequest};
pub use dashboard_api::{DashboardApi, ReportQuery};
pub use error::{ApiError, ApiResult};
pub use inventory_api::{
    ConfirmSupplyRequest, InventoryApi, OverrideSupplyRequest, SupplyQuery, SupplyRequest,
};
pub use order_api::{CreateOrderRequest, OrderApi, OrderDetail, OrderQuery, UpdateOrderRequest};
pub use waitlist_api::{ProcessWaitlistRequest, WaitlistApi, WaitlistQuery};
