// ==========================================
// 雏鸡订单分配系统 - 应用状态
// ==========================================
// 职责: 组装仓储 → 引擎 → API，持有 HTTP 层共享的实例
// 说明: 所有仓储共用同一个 SQLite 连接（Arc<Mutex<Connection>>）
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::api::{
    AllocationApi, AuthApi, ConfigApi, CustomerApi, DashboardApi, InventoryApi, OrderApi,
    WaitlistApi,
};
use crate::app::allocation_worker::{allocation_worker, AllocationWorker};
use crate::auth::TokenConfig;
use crate::config::{AllocationRulesReader, ConfigManager, ServerConfig};
use crate::engine::{
    AllocationEventPublisher, AllocationOrchestrator, DateLockRegistry, InlineRunPublisher,
    InventoryLedger, OrderBook, StatsAggregator, WaitlistManager,
};
use crate::notification::{LogChannel, NotificationService};
use crate::repository::{
    AllocationRepository, CustomerRepository, NotificationRepository, OrderRepository,
    SupplyRepository, UserRepository, WaitlistRepository,
};

/// 应用状态
///
/// 包含所有 API 实例和共享资源，HTTP 层以 Arc<AppState> 共享
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub auth_api: Arc<AuthApi>,
    pub order_api: Arc<OrderApi>,
    pub customer_api: Arc<CustomerApi>,
    pub inventory_api: Arc<InventoryApi>,
    pub allocation_api: Arc<AllocationApi>,
    pub waitlist_api: Arc<WaitlistApi>,
    pub dashboard_api: Arc<DashboardApi>,
    pub config_api: Arc<ConfigApi>,

    /// 分配编排器（后台 worker 与手动分配共用）
    pub orchestrator: Arc<AllocationOrchestrator>,
    /// 分配规则（通知取提货截止时间）
    pub rules: Arc<dyn AllocationRulesReader>,
    /// 通知服务
    pub notifier: Arc<NotificationService>,

    /// 待启动的后台分配 worker（同步模式下为 None）
    worker: Mutex<Option<AllocationWorker>>,
}

impl AppState {
    /// 按进程配置创建 AppState
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例（后台 worker 需调用 start_worker 启动）
    /// - Err(String): 数据库打开/建表失败
    pub fn new(config: &ServerConfig) -> Result<Self, String> {
        tracing::info!(db_path = %config.db_path, "初始化 AppState");

        let conn = crate::db::open_shared_connection(&config.db_path)
            .map_err(|e| format!("无法打开数据库 {}: {}", config.db_path, e))?;

        Self::with_connection(conn, config)
    }

    /// 基于已建表的共享连接创建 AppState（测试使用临时库）
    pub fn with_connection(
        conn: Arc<Mutex<Connection>>,
        config: &ServerConfig,
    ) -> Result<Self, String> {
        // ==========================================
        // 初始化 Repository 层
        // ==========================================
        let customer_repo = Arc::new(CustomerRepository::new(conn.clone()));
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let supply_repo = Arc::new(SupplyRepository::new(conn.clone()));
        let allocation_repo = Arc::new(AllocationRepository::new(conn.clone()));
        let waitlist_repo = Arc::new(WaitlistRepository::new(conn.clone()));
        let notification_repo = Arc::new(NotificationRepository::new(conn.clone()));
        let user_repo = Arc::new(UserRepository::new(conn.clone()));

        // ==========================================
        // 初始化 Engine 层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let rules: Arc<dyn AllocationRulesReader> = config_manager.clone();
        let locks = Arc::new(DateLockRegistry::new());

        let orchestrator = Arc::new(AllocationOrchestrator::new(
            allocation_repo.clone(),
            rules.clone(),
            locks.clone(),
        ));

        // 事件发布器: 同步模式直接在调用线程分配，否则投递到后台 worker
        let (events, worker): (Arc<dyn AllocationEventPublisher>, Option<AllocationWorker>) =
            if config.run_inline {
                tracing::info!("分配模式: 同步执行");
                (Arc::new(InlineRunPublisher::new(orchestrator.clone())), None)
            } else {
                tracing::info!("分配模式: 后台 worker");
                let (handle, worker) = allocation_worker();
                (Arc::new(handle), Some(worker))
            };

        let ledger = Arc::new(InventoryLedger::new(supply_repo.clone(), events.clone()));
        let order_book = Arc::new(OrderBook::new(
            order_repo.clone(),
            customer_repo.clone(),
            allocation_repo.clone(),
            locks.clone(),
            events,
        ));
        let waitlist_manager = Arc::new(WaitlistManager::new(
            waitlist_repo.clone(),
            allocation_repo.clone(),
            rules.clone(),
            locks,
        ));
        let stats = Arc::new(StatsAggregator::new(
            supply_repo,
            order_repo.clone(),
            allocation_repo.clone(),
            waitlist_repo.clone(),
            customer_repo.clone(),
        ));

        let notifier = Arc::new(NotificationService::new(
            Arc::new(LogChannel),
            notification_repo,
            customer_repo.clone(),
        ));

        // ==========================================
        // 初始化 API 层
        // ==========================================
        let auth_api = Arc::new(AuthApi::new(
            user_repo,
            customer_repo.clone(),
            TokenConfig {
                secret: config.jwt_secret.clone(),
                ttl_hours: config.token_ttl_hours,
            },
        ));
        let order_api = Arc::new(OrderApi::new(
            order_book,
            customer_repo.clone(),
            allocation_repo.clone(),
            waitlist_repo,
        ));
        let customer_api = Arc::new(CustomerApi::new(customer_repo.clone()));
        let inventory_api = Arc::new(InventoryApi::new(ledger));
        let allocation_api = Arc::new(AllocationApi::new(
            orchestrator.clone(),
            allocation_repo,
            order_repo,
            customer_repo,
        ));
        let waitlist_api = Arc::new(WaitlistApi::new(waitlist_manager));
        let dashboard_api = Arc::new(DashboardApi::new(stats));
        let config_api = Arc::new(ConfigApi::new(config_manager));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path: config.db_path.clone(),
            auth_api,
            order_api,
            customer_api,
            inventory_api,
            allocation_api,
            waitlist_api,
            dashboard_api,
            config_api,
            orchestrator,
            rules,
            notifier,
            worker: Mutex::new(worker),
        })
    }

    /// 启动后台分配 worker（需在 tokio 运行时内调用；只启动一次）
    ///
    /// # 返回
    /// - Some(JoinHandle): 已启动
    /// - None: 同步模式或已启动
    pub fn start_worker(&self) -> Option<JoinHandle<()>> {
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(e) => {
                tracing::error!(error = %e, "worker 锁获取失败");
                None
            }
        }?;

        Some(worker.spawn(
            self.orchestrator.clone(),
            self.rules.clone(),
            Some(self.notifier.clone()),
        ))
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}
