// ==========================================
// 雏鸡订单分配系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + axum
// 系统定位: 按日供给把雏鸡分配给订单，缺口进入候补
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配规则
pub mod engine;

// 导入导出层 - 客户 CSV / 提货清单
pub mod importer;

// 配置层 - 进程配置与分配规则
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 认证 - 口令哈希与访问令牌
pub mod auth;

// 通知 - 短信/邮件/推送
pub mod notification;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装、后台 worker、HTTP 路由
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AllocationStatus, CustomerTier, OrderStatus, UserRole, WaitlistStatus};

// 领域实体
pub use domain::{Allocation, Customer, Order, SessionContext, SupplyRecord, User, WaitlistEntry};

// 引擎
pub use engine::{
    AllocationEngine, AllocationOrchestrator, InventoryLedger, OrderBook, StatsAggregator,
    WaitlistManager,
};

// 应用
pub use app::{build_router, AppState};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "雏鸡订单分配系统";

// 数据库版本
pub const DB_VERSION: &str = "v1";
